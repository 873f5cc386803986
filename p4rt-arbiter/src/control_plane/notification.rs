//! Mastership notifications sent on controller streams.

use crate::proto::p4runtime::{MasterArbitrationUpdate, StreamMessageResponse};
use crate::status::{ok_rpc_status, Code};
use crate::proto::rpc;

pub(crate) const NOT_MASTER_MESSAGE: &str = "You are not my master!";

/// Arbitration response announcing `master_election_id`, addressed to the
/// master itself.
pub(crate) fn master_notice(node_id: u64, master_election_id: u128) -> StreamMessageResponse {
    arbitration_response(node_id, master_election_id, ok_rpc_status())
}

/// Same announcement for every controller that is not the master.
pub(crate) fn not_master_notice(node_id: u64, master_election_id: u128) -> StreamMessageResponse {
    arbitration_response(
        node_id,
        master_election_id,
        rpc::Status {
            code: Code::AlreadyExists.as_i32(),
            message: NOT_MASTER_MESSAGE.to_string(),
        },
    )
}

pub(crate) fn notice_for(
    node_id: u64,
    master_election_id: u128,
    is_master: bool,
) -> StreamMessageResponse {
    if is_master {
        master_notice(node_id, master_election_id)
    } else {
        not_master_notice(node_id, master_election_id)
    }
}

fn arbitration_response(
    node_id: u64,
    master_election_id: u128,
    status: rpc::Status,
) -> StreamMessageResponse {
    StreamMessageResponse::arbitration(MasterArbitrationUpdate {
        device_id: node_id,
        election_id: Some(master_election_id.into()),
        status: Some(status),
    })
}

#[cfg(test)]
mod tests {
    use super::{notice_for, NOT_MASTER_MESSAGE};
    use crate::proto::p4runtime::{election_id_of, stream_message_response::Update};
    use crate::status::Code;

    #[test]
    fn master_notice_is_ok() {
        let Some(Update::Arbitration(update)) = notice_for(3, 9, true).update else {
            panic!("expected arbitration");
        };
        assert_eq!(update.device_id, 3);
        assert_eq!(election_id_of(update.election_id.as_ref()), 9);
        assert_eq!(update.status.map(|s| s.code), Some(Code::Ok.as_i32()));
    }

    #[test]
    fn non_master_notice_is_already_exists() {
        let Some(Update::Arbitration(update)) = notice_for(3, u128::MAX, false).update else {
            panic!("expected arbitration");
        };
        assert_eq!(election_id_of(update.election_id.as_ref()), u128::MAX);
        let status = update.status.expect("status set");
        assert_eq!(status.code, Code::AlreadyExists.as_i32());
        assert_eq!(status.message, NOT_MASTER_MESSAGE);
    }
}
