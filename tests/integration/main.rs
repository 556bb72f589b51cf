//! End-to-end tests over scripted upstream providers.

mod availability;
mod mock_upstream;
mod reads;
