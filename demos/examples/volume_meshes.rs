// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Labelled segments of a volume, extracted in the background and shown in a
//! rotatable, zoomable mesh view.
//!
//! Run:
//! - `RUST_LOG=scopegraph_views=debug cargo run -p scopegraph_demos --example volume_meshes`

use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use kurbo::Point;
use scopegraph_gui::{Button, Command, ContextSettings, Modifiers, Recorder, Window, WindowMode};
use scopegraph_views::{
    ExplicitVolume, ExtractionOptions, ExtractionPool, HideSegment, MeshView, RotateView,
    ShowSegment, VolumeExtractor, ZoomOptions, ZoomView,
};
use tracing::info;

/// Three labelled blocks in a 24^3 volume.
fn volume() -> Result<ExplicitVolume, Box<dyn Error>> {
    let n = 24_u32;
    let mut data = Vec::new();
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let label = match (x / 8, y / 8, z / 8) {
                    (0, 0, 0) => 1.0,
                    (1, 1, 1) => 2.0,
                    (2, 0, 2) => 3.0,
                    _ => 0.0,
                };
                data.push(label);
            }
        }
    }
    Ok(ExplicitVolume::new(n, n, n, data)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let volume = Arc::new(volume()?);
    let pool = ExtractionPool::new(
        ExtractionOptions::default().with_workers(2),
        VolumeExtractor::new(Arc::clone(&volume)),
    )?;

    let recorder = Rc::new(Recorder::new());
    let mut window = Window::new(
        WindowMode::default().with_size(800, 600),
        &ContextSettings::default(),
        recorder.clone(),
    )?;
    let zoom = window.add(ZoomView::new(ZoomOptions::default().with_autoscale(true))?)?;
    let rotate = window.graph_mut().insert(Some(zoom), RotateView::new())?;
    let meshes = window
        .graph_mut()
        .insert(Some(rotate), MeshView::new().with_extraction(pool))?;
    window.validate()?;

    for id in volume.labels() {
        window
            .graph_mut()
            .send_down(meshes, &mut ShowSegment::new(id))?;
    }

    // Extraction runs in the background; keep drawing until it settles.
    let mut frames = 0;
    while window.is_dirty() && frames < 100 {
        window.redraw()?;
        frames += 1;
        let lists = recorder
            .take_commands()
            .iter()
            .filter(|c| matches!(c, Command::CallList(_)))
            .count();
        info!(frames, lists, compiles = recorder.compiles(), "frame");
        std::thread::sleep(Duration::from_millis(5));
    }

    // Drag across the content to rotate it.
    window.process_mouse_down(Point::new(400.0, 300.0), Button::Left, Modifiers::LEFT_DOWN)?;
    window.process_mouse_move(Point::new(480.0, 320.0), Modifiers::LEFT_DOWN)?;
    window.process_mouse_up(Point::new(480.0, 320.0), Button::Left, Modifiers::empty())?;
    if let Some(view) = window.graph().get::<RotateView>(rotate) {
        info!(rotation = ?view.rotation(), "rotated");
    }

    window
        .graph_mut()
        .send_down(meshes, &mut HideSegment::new(2))?;
    window.redraw()?;

    if let Some(view) = window.graph().get::<MeshView>(meshes) {
        let exported = view.export_meshes();
        info!(
            segments = exported.len(),
            bounds = ?exported.bounding_box(),
            "exported meshes"
        );
    }
    Ok(())
}
