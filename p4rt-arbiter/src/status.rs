/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Error space of the arbiter and its mapping onto canonical RPC codes.
//!
//! Internal operations fail with an [`ErrorCode`]; callers at the RPC boundary
//! only ever see the canonical [`Code`] derived from it.

use crate::proto::p4runtime::{StreamError, StreamMessageResponse};
use crate::proto::rpc;
use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

/// Canonical RPC status codes, numbered as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal error space. Several internal codes may collapse onto the same
/// canonical [`Code`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Cancelled,
    Unknown,
    PermissionDenied,
    Aborted,
    DataLoss,
    Unauthenticated,
    Internal,
    HardwareError,
    InvalidParam,
    InvalidP4Info,
    OperTimeout,
    EntryNotFound,
    EntryExists,
    Unimplemented,
    OperNotSupported,
    OperDisabled,
    FeatureUnavailable,
    NoResource,
    FailedPrecondition,
    NotInitialized,
    OutOfRange,
    TableFull,
    TableEmpty,
    /// The operation succeeded but only takes effect after a reboot.
    RebootRequired,
}

impl ErrorCode {
    pub fn canonical_code(self) -> Code {
        match self {
            ErrorCode::Cancelled => Code::Cancelled,
            ErrorCode::Unknown => Code::Unknown,
            ErrorCode::PermissionDenied => Code::PermissionDenied,
            ErrorCode::Aborted => Code::Aborted,
            ErrorCode::DataLoss => Code::DataLoss,
            ErrorCode::Unauthenticated => Code::Unauthenticated,
            ErrorCode::Internal | ErrorCode::HardwareError => Code::Internal,
            ErrorCode::InvalidParam | ErrorCode::InvalidP4Info => Code::InvalidArgument,
            ErrorCode::OperTimeout => Code::DeadlineExceeded,
            ErrorCode::EntryNotFound => Code::NotFound,
            ErrorCode::EntryExists => Code::AlreadyExists,
            ErrorCode::Unimplemented | ErrorCode::OperNotSupported | ErrorCode::OperDisabled => {
                Code::Unimplemented
            }
            ErrorCode::FeatureUnavailable => Code::Unavailable,
            ErrorCode::NoResource => Code::ResourceExhausted,
            ErrorCode::FailedPrecondition | ErrorCode::NotInitialized => Code::FailedPrecondition,
            ErrorCode::OutOfRange | ErrorCode::TableFull | ErrorCode::TableEmpty => {
                Code::OutOfRange
            }
            ErrorCode::RebootRequired => Code::Unknown,
        }
    }
}

/// A failed operation: an internal error code plus a human readable message.
#[derive(Clone, PartialEq, Eq)]
pub struct Status {
    error_code: ErrorCode,
    message: String,
}

impl Status {
    pub fn fail_with_code(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    pub fn code(&self) -> Code {
        self.error_code.canonical_code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_cancelled(&self) -> bool {
        self.error_code == ErrorCode::Cancelled
    }

    /// Wire form returned to RPC callers.
    pub fn to_rpc_status(&self) -> rpc::Status {
        rpc::Status {
            code: self.code().as_i32(),
            message: self.message.clone(),
        }
    }

    /// In-band stream error carrying this status. The caller attaches the
    /// offending payload to `details`.
    pub fn to_stream_error_response(&self) -> StreamMessageResponse {
        StreamMessageResponse::error(StreamError {
            canonical_code: self.code().as_i32(),
            message: self.message.clone(),
            space: String::new(),
            code: self.error_code as i32,
            details: None,
        })
    }
}

impl Debug for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Status({:?}: {})", self.error_code, self.message)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message)
    }
}

impl Error for Status {}

/// Wire form of a successful call.
pub fn ok_rpc_status() -> rpc::Status {
    rpc::Status {
        code: Code::Ok.as_i32(),
        message: String::new(),
    }
}
