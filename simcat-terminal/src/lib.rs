//! SIM Application Toolkit terminal runtime
//!
//! This crate runs the terminal side of the proactive command protocol for
//! one or more card slots. It includes:
//!
//! - Task framework for per-slot async actors
//! - Decode stage: hex envelopes to command parameters, icon loading
//! - Session Dispatcher: command routing, response correlation, Terminal
//!   Response and Envelope emission
//! - Session registry owning every slot
//! - Collaborator traits for the modem transport, the host application and
//!   the icon reader
//! - Configuration loading and a console front end
//!
//! # Example
//!
//! ```rust,ignore
//! use simcat_terminal::{SessionRegistry, SlotCollaborators};
//!
//! let registry = SessionRegistry::new(config, |slot| make_collaborators(slot))?;
//! let slot = registry.slot(0)?;
//! slot.submit_envelope("d01a8103012180...").await?;
//! ```

pub mod app;
pub mod collab;
pub mod decoder;
pub mod dispatcher;
pub mod registry;
pub mod session;
pub mod tasks;

// Re-export collaborator types
pub use collab::{
    CatApplication, CatTransport, CollaboratorFactory, IconLoadError, IconLoader, NoIconLoader,
    SlotCollaborators,
};

// Re-export runtime types
pub use decoder::{CommandDecoder, DecoderTask};
pub use dispatcher::{Clock, DispatcherTask};
pub use registry::{RegistryError, SessionRegistry, SlotHandle};
pub use session::{Session, SessionSnapshot, SessionState};

// Re-export task types
pub use tasks::{
    CommandOrigin, DecoderMessage, DispatcherMessage, Task, TaskError, TaskHandle, TaskId,
    TaskManager, TaskMessage, TaskState, DEFAULT_SHUTDOWN_TIMEOUT_MS,
};
