// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod color;
pub mod directory;
pub mod editor;
pub mod error;
pub mod forms;
pub mod ids;
pub mod model;
pub mod pager;
pub mod panel;
pub mod query;
pub mod state;
pub mod store;

pub use directory::*;
pub use editor::*;
pub use error::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use pager::*;
pub use panel::*;
pub use query::*;
pub use state::*;
pub use store::*;
