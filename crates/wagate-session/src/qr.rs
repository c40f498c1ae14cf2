// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR payload rendering.
//!
//! The transport emits the raw linking payload as text; the dashboard expects
//! a data URL it can drop into an `<img>` tag.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;

use wagate_core::WagateError;

/// Render a raw QR payload into an SVG data URL.
pub fn to_data_url(payload: &str) -> Result<String, WagateError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| WagateError::Internal(format!("failed to encode QR payload: {e}")))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build();
    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image)
    ))
}
