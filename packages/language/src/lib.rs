//! # Blockcode Language
//!
//! Document model for a block-based structural Python editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ catalog: node kinds, child sets, layouts    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ tree: arena of typed nodes + child sets     │
//! │  - serialize / deserialize                  │
//! │  - fragments + paste adapters               │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: validated edits                    │
//! │  - scope tree + rename propagation          │
//! │  - node / child set / scope mutations       │
//! │  - Python export                            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Tree is source of truth**: Python source is a derived view
//! 2. **Category-checked structure**: every slot accepts one node category
//! 3. **Observable edits**: every change on the live tree fires exactly one mutation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockcode_language::{EditingSession, SessionOptions};
//!
//! let mut session = EditingSession::new(SessionOptions::default());
//! let root = session.load_file("hello.json")?;
//!
//! let _sub = session.subscribe_child_sets(|mutation| println!("{mutation:?}"));
//! let body = session.document().child_set_ref(root, "body").unwrap();
//! session.remove_child(body, 0)?;
//!
//! println!("{}", session.export_python()?);
//! ```

pub mod adapters;
pub mod category;
pub mod dispatcher;
pub mod errors;
pub mod fragment;
pub mod kind;
pub mod mutations;
pub mod options;
pub mod python;
pub mod scope;
pub mod serialize;
pub mod session;
pub mod tree;

pub use adapters::{FragmentAdapterRegistry, ResolvedFragmentAdapter};
pub use category::NodeCategory;
pub use dispatcher::{Channel, MutationDispatcher, Subscription};
pub use errors::{FragmentError, LanguageError, LanguageResult, SaveError, SessionError, TreeError};
pub use fragment::{combine_fragments, Fragment, SerializedFragment};
pub use kind::{ChildSetKind, ChildSetLayout, ChildSetSpec, KindSpec, LayoutComponent, NodeKind};
pub use mutations::{
    ChildSetMutation, ChildSetMutationKind, InsertedNode, Mutation, NodeMutation, NodeMutationKind, ScopeMutation,
    ScopeMutationKind,
};
pub use options::{SessionOptions, PYTHON_BUILTINS};
pub use scope::{Scope, ScopeId, ScopeTree, VariableEntry, VariableKind, VariableMetadata};
pub use serialize::SerializedNode;
pub use session::EditingSession;
pub use tree::{ChildSet, ChildSetRef, Document, Node, NodeId, Validity};
