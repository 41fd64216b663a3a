//! Source images and the requests that name them.
//!
//! A load request arrives as a module id such as
//! `photo.jpg?w=400;800&format=webp`. [`ImageRequest`] splits it into the
//! source path and its directives, [`RequestFilter`] decides whether the id
//! is an image request at all, and [`SourceAsset`] loads the source bytes and
//! metadata lazily, at most once per request.
//!
//! ```text
//! "assets/photo.jpg?w=400;800"
//!          │
//!          ▼
//! ┌─────────────────┐      ┌──────────────────────────────┐
//! │  ImageRequest   │─────▶│         SourceAsset          │
//! │ path + query    │      │ bytes / metadata / digest    │
//! └─────────────────┘      │ (each memoized on first use) │
//!                          └──────────────────────────────┘
//! ```

mod asset;
mod request;

pub use asset::SourceAsset;
pub use request::{ImageRequest, RequestFilter, DEFAULT_EXCLUDE, DEFAULT_INCLUDE};
