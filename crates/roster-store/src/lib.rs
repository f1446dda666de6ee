// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod memory;
mod predicate;
mod sharepoint;

pub use memory::MemoryStore;
pub use predicate::Predicate;
pub use sharepoint::SharePointStore;
