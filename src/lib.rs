// Copyright © 2017 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! A spatial-association engine sitting between a BSP-partitioned world and
//! its moving population of renderables: leaf/renderable/shadow membership
//! tracking, dirty-driven re-insertion, and per-view render-list assembly.

pub mod bidir_set;
pub mod config;
pub mod error;
pub mod external;
pub mod handle;
pub mod leaf_system;

pub use config::LeafSystemConfig;
pub use error::{LeafSystemError, LeafSystemErrorKind};
pub use external::{BspQuery, DetailObjectSystem, EngineQueries, ModelKind, ReceiverKind, RenderableCaps, ShadowManager};
pub use handle::{DomainKey, RenderHandle, ShadowHandle};
pub use leaf_system::render_list::{CEntry, RenderLists, SetupRenderInfo};
pub use leaf_system::renderable::{RenderFlags, RenderGroup, RenderGroupRequest};
pub use leaf_system::shadow::ShadowFlags;
pub use leaf_system::ClientLeafSystem;
