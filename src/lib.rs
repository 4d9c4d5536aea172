//! Grid-based note board: placement, merge, and a collaborative document store.
//!
//! A board shows a user's personal notes next to shared notes that every user
//! sees. Notes sit on an integer grid and never overlap. Shared notes keep an
//! independent position per user. Mutations apply locally first and are
//! persisted by a background writer; the store echoes every change back as a
//! full snapshot batch per collection.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`grid`] | Cell rectangles, overlap test, pixel conversions |
//! | [`placement`] | First-free-slot resolver with a bounded row scan |
//! | [`note`] | Domain notes, wire records, patches, per-user placements |
//! | [`merge`] | Per-source replace-and-splice of snapshot batches |
//! | [`board`] | Board controller: mutations, drag, auto-placement |
//! | [`layout`] | Column count, grid vs stacked mode, render boxes |
//! | [`theme`] | Process-wide subscribable theme store |
//! | [`persistence`] | Fire-and-forget write queue and worker |
//! | [`session`] | Event loop tying feeds and commands to a controller |
//! | [`store`] | Store trait with memory, Postgres, and remote backends |
//! | [`routes`] | HTTP + websocket store server |
//! | [`config`] | Environment configuration |
//! | [`consts`] | Shared numeric constants |

pub mod board;
pub mod config;
pub mod consts;
pub mod db;
pub mod grid;
pub mod layout;
pub mod merge;
pub mod note;
pub mod persistence;
pub mod placement;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod theme;

/// Stable machine-readable code for an error, used in HTTP error bodies and
/// structured logs.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}
