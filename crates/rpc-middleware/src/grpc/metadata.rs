//! Conversion between gRPC metadata and [`CallContext`].

use super::TRACE_ID_METADATA_KEY;
use crate::context::{CallContext, Metadata, TRACE_ID_HEADER};
use tonic::metadata::{Ascii, KeyAndValueRef, MetadataKey, MetadataMap, MetadataValue};

/// Build a call context from inbound gRPC metadata.
///
/// Only ASCII entries are carried over. The trace header arrives lowercased
/// and is stored under `X-Trace-Id`; every other key keeps its wire form.
/// Returns an empty context when no entry qualifies.
#[must_use]
pub fn context_from_metadata(metadata: &MetadataMap) -> CallContext {
    let mut md = Metadata::new();

    for entry in metadata.iter() {
        let KeyAndValueRef::Ascii(key, value) = entry else {
            continue;
        };
        let Ok(value) = value.to_str() else {
            continue;
        };
        let key = key.as_str();
        if key.eq_ignore_ascii_case(TRACE_ID_HEADER) {
            md.insert(TRACE_ID_HEADER, value);
        } else {
            md.insert(key, value);
        }
    }

    if md.is_empty() {
        CallContext::new()
    } else {
        CallContext::with_metadata(md)
    }
}

/// Copy the context's metadata onto outbound gRPC metadata.
///
/// Keys are lowercased. Entries whose key or value is not valid gRPC
/// metadata are skipped. The trace id is written once, from `X-Trace-Id`
/// when present, so differently-cased duplicates cannot replace it.
pub fn inject_context(context: &CallContext, metadata: &mut MetadataMap) {
    let Some(md) = context.metadata() else {
        return;
    };

    for (key, value) in md.iter() {
        if key.eq_ignore_ascii_case(TRACE_ID_HEADER) {
            continue;
        }
        let Ok(name) = MetadataKey::<Ascii>::from_bytes(key.to_ascii_lowercase().as_bytes()) else {
            tracing::debug!(target: "rpc.middleware.trace", key = %key, "Skipping invalid metadata key");
            continue;
        };
        insert_ascii(metadata, name, key, value);
    }

    let trace_id = context.trace_id().or_else(|| {
        md.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(TRACE_ID_HEADER))
            .map(|(_, value)| value)
    });
    if let Some(trace_id) = trace_id {
        insert_ascii(
            metadata,
            MetadataKey::from_static(TRACE_ID_METADATA_KEY),
            TRACE_ID_HEADER,
            trace_id,
        );
    }
}

fn insert_ascii(metadata: &mut MetadataMap, name: MetadataKey<Ascii>, key: &str, value: &str) {
    let Ok(value) = value.parse::<MetadataValue<Ascii>>() else {
        tracing::debug!(target: "rpc.middleware.trace", key = %key, "Skipping invalid metadata value");
        return;
    };
    metadata.insert(name, value);
}
