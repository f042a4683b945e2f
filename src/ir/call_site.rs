// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use serde::{Deserialize, Serialize};

use super::program::{ClassId, MethodId, VarId};

/// How a call site selects its callee.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CallKind {
    /// No receiver, the callee is the referenced method.
    Static,
    /// Receiver present but the callee is fixed by the reference
    /// (constructors, private and super calls).
    Special,
    /// Dispatched on the run-time class of the receiver object.
    Virtual,
    /// Like `Virtual`, through an interface reference.
    Interface,
    /// Bootstrap-linked call. The solver never resolves these itself.
    Dynamic,
    /// Edges injected by plugins that do not correspond to an ordinary
    /// invocation. They never pass arguments or results.
    Other,
}

impl CallKind {
    /// Returns true if the callee depends on the receiver object.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, CallKind::Virtual | CallKind::Interface)
    }

    pub fn has_receiver(&self) -> bool {
        matches!(self, CallKind::Special | CallKind::Virtual | CallKind::Interface)
    }
}

/// A method as named at a call site: the declaring class of the reference
/// plus the sub-signature used for dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodRef {
    pub class: ClassId,
    pub subsignature: String,
}

impl MethodRef {
    pub fn new(class: ClassId, subsignature: impl Into<String>) -> Self {
        MethodRef {
            class,
            subsignature: subsignature.into(),
        }
    }
}

/// An invocation statement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallSiteDef {
    /// The method containing the call.
    pub container: MethodId,
    pub kind: CallKind,
    pub method_ref: MethodRef,
    /// Receiver variable of an instance call.
    #[serde(default)]
    pub recv: Option<VarId>,
    #[serde(default)]
    pub args: Vec<VarId>,
    /// Variable receiving the call's result.
    #[serde(default)]
    pub result: Option<VarId>,
}
