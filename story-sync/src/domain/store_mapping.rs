//! Mapping helpers between domain records, store documents, and errors.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::Error;
use crate::domain::ports::{LocalStoreError, StoredDocument, StoryRemoteError};

pub(crate) fn map_store_error(error: LocalStoreError) -> Error {
    match error {
        LocalStoreError::NotInitialized => Error::storage_unavailable(error.to_string()),
        LocalStoreError::Unavailable { message } => Error::storage_unavailable(message),
        LocalStoreError::Query { message } => {
            Error::storage_unavailable(format!("local store write or read failed: {message}"))
        }
        LocalStoreError::InvalidKey { .. } | LocalStoreError::UnknownIndex { .. } => {
            Error::internal(error.to_string())
        }
        LocalStoreError::Serialization { message } => Error::internal(message),
    }
}

pub(crate) fn map_remote_error(error: StoryRemoteError) -> Error {
    match error {
        StoryRemoteError::Network { message } => Error::network_failure(message),
        StoryRemoteError::Rejected { status, message } => {
            Error::remote_rejected(format!("{message} (status {status})"))
        }
        StoryRemoteError::Decode { message } => Error::remote_rejected(message),
    }
}

pub(crate) fn encode_body<T: Serialize>(record: &T) -> Result<Value, Error> {
    serde_json::to_value(record)
        .map_err(|error| Error::internal(format!("failed to serialise record: {error}")))
}

pub(crate) fn decode_body<T: DeserializeOwned>(document: &StoredDocument) -> Result<T, Error> {
    T::deserialize(&document.body).map_err(|error| {
        Error::internal(format!(
            "stored record {} is malformed: {error}",
            document.key
        ))
    })
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(LocalStoreError::not_initialized(), ErrorCode::StorageUnavailable)]
    #[case(LocalStoreError::unavailable("quota"), ErrorCode::StorageUnavailable)]
    #[case(LocalStoreError::query("locked"), ErrorCode::StorageUnavailable)]
    #[case(LocalStoreError::invalid_key("bad"), ErrorCode::InternalError)]
    #[case(LocalStoreError::serialization("eof"), ErrorCode::InternalError)]
    fn store_errors_map_to_domain_codes(#[case] error: LocalStoreError, #[case] code: ErrorCode) {
        assert_eq!(map_store_error(error).code(), code);
    }

    #[rstest]
    #[case(StoryRemoteError::network("reset"), ErrorCode::NetworkFailure)]
    #[case(StoryRemoteError::rejected(422_u16, "bad"), ErrorCode::RemoteRejected)]
    #[case(StoryRemoteError::decode("html"), ErrorCode::RemoteRejected)]
    fn remote_errors_map_to_domain_codes(#[case] error: StoryRemoteError, #[case] code: ErrorCode) {
        assert_eq!(map_remote_error(error).code(), code);
    }
}
