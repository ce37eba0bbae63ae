//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below exercises one slice of the controller against the mock
//! adapters in [`mock_hw`].  Everything runs on the host.

mod access_tests;
mod mock_hw;
mod sync_channel_tests;
