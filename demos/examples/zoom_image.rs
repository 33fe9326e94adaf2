// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A labelled image inside a fitted zoom view, driven by scripted input.
//!
//! Frames are recorded headlessly; the demo logs what each one contains.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p scopegraph_demos --example zoom_image`

use std::error::Error;
use std::rc::Rc;

use kurbo::Point;
use scopegraph_gui::{Button, Command, ContextSettings, Key, Modifiers, Recorder, Window, WindowMode};
use scopegraph_views::{Image, ImageView, ZoomOptions, ZoomView};
use tracing::info;

/// A gray ramp with two labelled blocks.
fn image() -> Result<Image, Box<dyn Error>> {
    let (width, height) = (64_u32, 32_u32);
    let mut data = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let value = match (x / 16, y / 16) {
                (1, 0) => 7.0,
                (2, 1) => 12.0,
                _ => x as f32 / width as f32,
            };
            data.push(value);
        }
    }
    Ok(Image::new(width, height, data)?)
}

fn report(recorder: &Recorder, frame: &str) {
    let commands = recorder.take_commands();
    let quads = commands
        .iter()
        .filter(|c| matches!(c, Command::TexturedQuad { .. }))
        .count();
    info!(
        frame,
        commands = commands.len(),
        quads,
        uploads = recorder.uploads(),
        "frame recorded"
    );
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let recorder = Rc::new(Recorder::new());
    let mut window = Window::new(
        WindowMode::default().with_size(640, 480),
        &ContextSettings::default(),
        recorder.clone(),
    )?;
    let zoom = window.add(ZoomView::new(ZoomOptions::default().with_autoscale(true))?)?;
    window
        .graph_mut()
        .insert(Some(zoom), ImageView::new(image()?))?;
    window.validate()?;

    window.redraw()?;
    report(&recorder, "fitted");

    let ctrl = Modifiers::CONTROL_DOWN;
    window.process_mouse_down(Point::new(320.0, 240.0), Button::WheelUp, ctrl)?;
    window.process_mouse_down(Point::new(320.0, 240.0), Button::WheelUp, ctrl)?;
    window.redraw()?;
    report(&recorder, "zoomed in");

    window.process_mouse_down(Point::new(100.0, 100.0), Button::Left, ctrl | Modifiers::LEFT_DOWN)?;
    window.process_mouse_move(Point::new(160.0, 120.0), ctrl | Modifiers::LEFT_DOWN)?;
    window.process_mouse_up(Point::new(160.0, 120.0), Button::Left, ctrl)?;
    window.redraw()?;
    report(&recorder, "panned");

    if let Some(view) = window.graph().get::<ZoomView>(zoom) {
        info!(transform = %view.user_transform(), "user transform");
    }

    window.process_key_down(Key::R, Modifiers::empty())?;
    window.redraw()?;
    report(&recorder, "reset");
    Ok(())
}
