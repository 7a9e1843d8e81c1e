/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Canonical structured field keys and value-format helpers.

use std::any::Any;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const KEY: &str = "key";
pub const GENERATION: &str = "generation";
pub const REF_COUNT: &str = "ref_count";
pub const CALLBACK_ID: &str = "callback_id";
pub const INSTANCE_ID: &str = "instance_id";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const REASON_FORCE_REMOVED: &str = "force_removed";
pub const REASON_LAST_RELEASE: &str = "last_release";
pub const REASON_UNSUBSCRIBE_ALL: &str = "unsubscribe_all";
pub const REASON_RETIRED: &str = "retired";
pub const REASON_GENERATION_ENDED: &str = "generation_ended_while_opening";
pub const UNKNOWN_PANIC: &str = "unknown panic payload";

/// Renders a caught panic payload for the `err` field.
pub fn format_panic_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        UNKNOWN_PANIC.to_string()
    }
}
