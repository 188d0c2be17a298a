//! Game implementations for the self-play engine.
//!
//! ## Available Games
//!
//! - [`gin`]: two-player gin rummy with an abstracted draw/discard/knock
//!   decision model
//!
//! ## Adding New Games
//!
//! 1. Create a new module under `src/games/`
//! 2. Define state, action and observation types
//! 3. Implement the `Game` trait
//! 4. Add tests that verify expected behavior

pub mod gin;
