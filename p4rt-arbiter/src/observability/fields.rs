//! Formatting helpers for structured log fields.

use crate::proto::p4runtime::{stream_message_request, StreamMessageRequest};

/// Human readable controller identity, used in connect/disconnect logs.
pub fn controller_name(connection_id: u64, election_id: u128, origin: &str) -> String {
    format!("(connection_id: {connection_id}, election_id: {election_id}, uri: {origin})")
}

pub fn format_election_id(election_id: u128) -> String {
    election_id.to_string()
}

pub fn request_kind(request: &StreamMessageRequest) -> &'static str {
    match request.update {
        Some(stream_message_request::Update::Arbitration(_)) => "arbitration",
        Some(stream_message_request::Update::Packet(_)) => "packet",
        Some(stream_message_request::Update::DigestAck(_)) => "digest_ack",
        None => "unset",
    }
}

pub fn role(is_master: bool) -> &'static str {
    if is_master {
        "MASTER"
    } else {
        "SLAVE"
    }
}

#[cfg(test)]
mod tests {
    use super::{controller_name, request_kind, role};
    use crate::proto::p4runtime::StreamMessageRequest;

    #[test]
    fn controller_name_lists_identity() {
        assert_eq!(
            controller_name(2, 9, "ipv4:10.0.0.1:5000"),
            "(connection_id: 2, election_id: 9, uri: ipv4:10.0.0.1:5000)"
        );
        assert_eq!(role(true), "MASTER");
    }

    #[test]
    fn request_kind_names_the_payload() {
        assert_eq!(request_kind(&StreamMessageRequest::arbitration(1, 1)), "arbitration");
        assert_eq!(request_kind(&StreamMessageRequest::default()), "unset");
    }
}
