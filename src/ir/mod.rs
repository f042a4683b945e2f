// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

pub mod builder;
pub mod call_site;
pub mod class_hierarchy;
pub mod context;
pub mod program;
