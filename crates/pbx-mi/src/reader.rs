use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::frame::Frame;

/// Reads one blank-line-terminated frame from a line-oriented stream.
/// Returns `Ok(None)` on clean EOF.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<Frame>> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return if lines.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Frame::parse_lines(&lines)))
            };
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            if lines.is_empty() {
                continue; // tolerate stray blank lines between frames
            }
            return Ok(Some(Frame::parse_lines(&lines)));
        }
        lines.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_one_frame_per_blank_line() {
        let data = b"Response: Success\r\nActionID: 1\r\n\r\nEvent: Hangup\r\nChannel: foo\r\n\r\n";
        let mut reader = BufReader::new(&data[..]);
        let first = read_frame(&mut reader).await.unwrap().unwrap();
        assert!(first.is_success());
        let second = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(second.event_name(), Some("Hangup"));
        let third = read_frame(&mut reader).await.unwrap();
        assert!(third.is_none());
    }
}
