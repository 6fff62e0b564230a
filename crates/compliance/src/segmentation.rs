/// Whether every character in `text` fits the (simplified) GSM 7-bit
/// default alphabet. Anything outside plain ASCII is treated as requiring
/// the 16-bit (UCS-2) alphabet, which is conservative but matches how the
/// corpus's SMS wrappers (OVH/Twilio) report segmentation to callers.
fn is_gsm7(text: &str) -> bool {
    text.chars().all(|c| (c as u32) < 128)
}

/// Segments `text` would fragment into, per §4.10/§8's boundary behaviour:
/// 160 chars for a single GSM-7 segment, 153 per concatenated part; 70 for
/// a single UCS-2 segment, 67 per concatenated part.
pub fn segment_count(text: &str, max_gsm7: usize, max_ucs2: usize) -> usize {
    let len = text.chars().count();
    if len == 0 {
        return 1;
    }
    let (single_cap, concat_cap) = if is_gsm7(text) {
        (max_gsm7, (max_gsm7 * 153) / 160)
    } else {
        (max_ucs2, (max_ucs2 * 67) / 70)
    };
    if len <= single_cap {
        1
    } else {
        (len + concat_cap - 1) / concat_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_segment_at_160_gsm7() {
        let text = "a".repeat(160);
        assert_eq!(segment_count(&text, 160, 70), 1);
    }

    #[test]
    fn two_segments_just_past_160() {
        let text = "a".repeat(161);
        assert_eq!(segment_count(&text, 160, 70), 2);
    }

    #[test]
    fn ucs2_boundary_at_70() {
        let text = "é".repeat(70);
        assert_eq!(segment_count(&text, 160, 70), 1);
        let text = "é".repeat(71);
        assert_eq!(segment_count(&text, 160, 70), 2);
    }
}
