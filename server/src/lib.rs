// Copyright (c) 2026 fieldserve
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod billing;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod routes;
