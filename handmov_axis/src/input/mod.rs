//! Button input layer.
//!
//! - [`debounce`] - Stability-window debouncing of raw levels
//! - [`button`] - Press-duration classification into jog, save and recall

pub mod button;
pub mod debounce;

pub use button::{ButtonAction, ButtonMachine};
pub use debounce::{Debounced, Debouncer};
