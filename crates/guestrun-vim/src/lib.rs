//! # guestrun-vim
//!
//! Vocabulary of the virtualization management endpoint consumed by
//! `guestrun-core`.
//!
//! This crate does not talk to the network itself. It defines the typed
//! managed-object references, guest-operation payloads and property-collector
//! specifications, plus the [`VimService`] trait through which an
//! already-authenticated connection is driven.
//!
//! ## Layering
//!
//! ```text
//! ┌───────────────────────────────┐
//! │  guestrun-core                │  Session, collector, transfer, runner
//! ├───────────────────────────────┤
//! │  guestrun-vim                 │  ManagedObjectRef, ProgramSpec,
//! │    - VimService (trait)       │  PropertyFilterSpec, PropertyValue
//! ├───────────────────────────────┤
//! │  connection bootstrap         │  TLS + login, implements VimService
//! └───────────────────────────────┘
//! ```

mod error;
mod guest;
mod mor;
mod property;
mod service;

pub use error::{Result, VimError};
pub use guest::{
    FileAttributes, FileTransferInformation, GuestAuth, GuestOperationsManager, GuestProcessInfo,
    ProgramSpec,
};
pub use mor::{kinds, ManagedObjectRef};
pub use property::{
    DynamicProperty, MissingProperty, ObjectContent, ObjectSpec, PropertyFilterSpec, PropertySpec,
    PropertyValue, TraversalSpec,
};
pub use service::{ServiceContent, VimService};
