//! Cart service facade.
//!
//! [`CartService`] is the single entry point for cart reads, mutations and
//! checkout. The caller's identity is given as a [`CartOwner`], resolved
//! once per call to the guest cart store or the user cart store. Limits are
//! injected at construction as a [`CartLimits`](common::CartLimits).

pub mod owner;
pub mod service;

pub use owner::CartOwner;
pub use service::CartService;
