//! `google.rpc.Status`, without the `details` payload.

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}
