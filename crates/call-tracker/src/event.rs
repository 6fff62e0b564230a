use pbx_mi::Frame;

/// Typed projection of the PBX-MI events this tracker reacts to. Fields
/// not needed by any handling rule are left on the frame and ignored.
#[derive(Debug, Clone)]
pub enum PbxEvent {
    Newchannel {
        channel: String,
        caller_id_num: String,
        caller_id_name: Option<String>,
        context: String,
        linked_id: String,
        exten: Option<String>,
    },
    DialBegin {
        channel: String,
        dest_channel: String,
        linked_id: String,
    },
    DialEnd {
        dest_channel: String,
        dial_status: String,
        linked_id: String,
    },
    Bridge {
        channel1: String,
        channel2: String,
        linked_id: String,
    },
    Hangup {
        channel: String,
        linked_id: String,
        cause: Option<String>,
    },
    Cdr {
        unique_id: String,
        source: String,
        destination: String,
        destination_context: String,
        disposition: String,
        start_time: Option<i64>,
        answer_time: Option<i64>,
        end_time: Option<i64>,
        channel: Option<String>,
        dest_channel: Option<String>,
    },
    Other,
}

fn get_owned(frame: &Frame, key: &str) -> Option<String> {
    frame.get(key).map(|v| v.to_string())
}

fn get_required(frame: &Frame, key: &str) -> String {
    frame.get(key).unwrap_or_default().to_string()
}

fn get_epoch(frame: &Frame, key: &str) -> Option<i64> {
    frame.get(key).and_then(|v| v.parse::<i64>().ok())
}

impl PbxEvent {
    pub fn from_frame(frame: &Frame) -> Self {
        match frame.event_name() {
            Some("Newchannel") => PbxEvent::Newchannel {
                channel: get_required(frame, "Channel"),
                caller_id_num: get_required(frame, "CallerIDNum"),
                caller_id_name: get_owned(frame, "CallerIDName"),
                context: get_required(frame, "Context"),
                linked_id: get_required(frame, "Linkedid"),
                exten: get_owned(frame, "Exten"),
            },
            Some("DialBegin") => PbxEvent::DialBegin {
                channel: get_required(frame, "Channel"),
                dest_channel: get_required(frame, "DestChannel"),
                linked_id: get_required(frame, "Linkedid"),
            },
            Some("DialEnd") => PbxEvent::DialEnd {
                dest_channel: get_required(frame, "DestChannel"),
                dial_status: get_required(frame, "DialStatus"),
                linked_id: get_required(frame, "Linkedid"),
            },
            Some("Bridge") | Some("BridgeEnter") => PbxEvent::Bridge {
                channel1: get_required(frame, "Channel1"),
                channel2: get_required(frame, "Channel2"),
                linked_id: get_required(frame, "Linkedid"),
            },
            Some("Hangup") => PbxEvent::Hangup {
                channel: get_required(frame, "Channel"),
                linked_id: get_required(frame, "Linkedid"),
                cause: get_owned(frame, "Cause"),
            },
            Some("Cdr") | Some("CDR") => PbxEvent::Cdr {
                unique_id: get_required(frame, "UniqueID"),
                source: get_required(frame, "Source"),
                destination: get_required(frame, "Destination"),
                destination_context: get_owned(frame, "DestinationContext").unwrap_or_default(),
                disposition: get_required(frame, "Disposition"),
                start_time: get_epoch(frame, "StartTime"),
                answer_time: get_epoch(frame, "AnswerTime"),
                end_time: get_epoch(frame, "EndTime"),
                channel: get_owned(frame, "Channel"),
                dest_channel: get_owned(frame, "DestChannel"),
            },
            _ => PbxEvent::Other,
        }
    }
}
