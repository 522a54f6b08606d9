// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod choices;
pub mod demo;
pub mod forms;
pub mod gate;
pub mod model;
pub mod recognition;
pub mod scroll;
pub mod selection;
pub mod session;
pub mod state;
pub mod store;
pub mod table;

pub use choices::*;
pub use demo::*;
pub use forms::*;
pub use gate::*;
pub use model::*;
pub use recognition::*;
pub use scroll::*;
pub use selection::*;
pub use session::*;
pub use state::*;
pub use store::*;
pub use table::*;
