//! API request handlers for the VoiceDeck service.

pub mod purchase;
