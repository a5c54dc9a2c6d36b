//! HTTP clients for external services used by the relayer.
//!
//! This crate provides:
//! - EventFeedClient: bridge events from the GraphQL indexer

mod event_feed;

pub use event_feed::{
    build_events_query, parse_events_response, EventFeedClient, FeedError, FeedEvent, FeedEvents,
    PAGE_SIZE,
};
