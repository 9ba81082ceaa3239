//! PixiPaint: a layered pixel-art editing core.
//!
//! The crate is organised bottom-up:
//! - [`color`]: RGBA/HSV conversions and Porter-Duff "over" blending.
//! - [`canvas`]: cells, grids and the layered canvas with its cached composite.
//! - [`camera`]: viewport math and rendering of a canvas onto an image.
//! - [`components`]: the tool engine, colour selector and palette.
//! - [`app`]: the per-frame editor controller tying them together.
//!
//! [`ops::scripting`] and [`cli`] drive the same core headlessly.

#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod camera;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;
