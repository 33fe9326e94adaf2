// Copyright 2025 the Scopegraph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A headless [`Backend`] that records what it is asked to do.

use std::cell::RefCell;
use std::fmt;

use hashbrown::HashMap;
use tracing::debug;

use crate::backend::{Backend, BackendError, Command, ContextSettings, ListId, TextureId};

#[derive(Debug, Default)]
struct State {
    settings: Option<ContextSettings>,
    next_id: u32,
    textures: HashMap<u32, (u32, u32)>,
    lists: HashMap<u32, Vec<Command>>,
    commands: Vec<Command>,
    uploads: usize,
    compiles: usize,
}

/// Backend without a GPU.
///
/// Submitted commands are appended to a log that tests and demos inspect with
/// [`Recorder::take_commands`]. Textures and lists are tracked so that leaks
/// and redundant uploads show up in the counters.
///
/// ```
/// use std::rc::Rc;
/// use scopegraph_gui::{Backend, Canvas, Command, ContextSettings, Recorder};
///
/// let recorder = Rc::new(Recorder::new());
/// recorder.activate(&ContextSettings::default()).unwrap();
/// let canvas = Canvas::new(recorder.clone());
/// {
///     let texture = canvas.create_texture().unwrap();
///     texture.upload(1, 1, &[255, 0, 0, 255]).unwrap();
///     assert_eq!(recorder.live_textures(), 1);
/// }
/// assert_eq!(recorder.live_textures(), 0);
/// canvas.submit(Command::Clear);
/// assert_eq!(recorder.take_commands(), vec![Command::Clear]);
/// ```
pub struct Recorder {
    max_version: (u8, u8),
    fail_allocations: bool,
    state: RefCell<State>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Recorder")
            .field("max_version", &self.max_version)
            .field("fail_allocations", &self.fail_allocations)
            .field("textures", &state.textures.len())
            .field("lists", &state.lists.len())
            .field("commands", &state.commands.len())
            .finish_non_exhaustive()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    /// A recorder accepting any context up to version 4.6.
    pub fn new() -> Self {
        Self {
            max_version: (4, 6),
            fail_allocations: false,
            state: RefCell::new(State::default()),
        }
    }

    /// Reject contexts newer than `major.minor`.
    pub fn with_max_version(mut self, major: u8, minor: u8) -> Self {
        self.max_version = (major, minor);
        self
    }

    /// A recorder whose texture and list allocations always fail.
    pub fn failing() -> Self {
        Self {
            fail_allocations: true,
            ..Self::new()
        }
    }

    /// Settings of the last successful activation.
    pub fn settings(&self) -> Option<ContextSettings> {
        self.state.borrow().settings
    }

    /// Number of textures currently allocated.
    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    /// Number of compiled lists currently allocated.
    pub fn live_lists(&self) -> usize {
        self.state.borrow().lists.len()
    }

    /// Total number of texture uploads so far.
    pub fn uploads(&self) -> usize {
        self.state.borrow().uploads
    }

    /// Total number of list compilations so far.
    pub fn compiles(&self) -> usize {
        self.state.borrow().compiles
    }

    /// Dimensions of a live texture.
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.state.borrow().textures.get(&texture.0).copied()
    }

    /// Contents of a live compiled list.
    pub fn list(&self, list: ListId) -> Option<Vec<Command>> {
        self.state.borrow().lists.get(&list.0).cloned()
    }

    /// Remove and return every command submitted so far.
    pub fn take_commands(&self) -> Vec<Command> {
        core::mem::take(&mut self.state.borrow_mut().commands)
    }

    fn allocate(&self, what: &'static str) -> Result<u32, BackendError> {
        let mut state = self.state.borrow_mut();
        if state.settings.is_none() {
            return Err(BackendError::NoContext);
        }
        if self.fail_allocations {
            return Err(BackendError::OutOfResources(what));
        }
        state.next_id += 1;
        Ok(state.next_id)
    }
}

impl Backend for Recorder {
    fn activate(&self, settings: &ContextSettings) -> Result<(), BackendError> {
        let requested = (settings.major_version, settings.minor_version);
        if requested > self.max_version {
            return Err(BackendError::UnsupportedVersion {
                requested,
                available: self.max_version,
            });
        }
        debug!(?settings, "recorder context activated");
        self.state.borrow_mut().settings = Some(*settings);
        Ok(())
    }

    fn create_texture(&self) -> Result<TextureId, BackendError> {
        let id = self.allocate("texture")?;
        self.state.borrow_mut().textures.insert(id, (0, 0));
        Ok(TextureId(id))
    }

    fn upload_texture(
        &self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), BackendError> {
        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() != expected {
            return Err(BackendError::TextureSize {
                width,
                height,
                len: rgba.len(),
            });
        }
        let mut state = self.state.borrow_mut();
        if let Some(size) = state.textures.get_mut(&texture.0) {
            *size = (width, height);
            state.uploads += 1;
        }
        Ok(())
    }

    fn release_texture(&self, texture: TextureId) {
        self.state.borrow_mut().textures.remove(&texture.0);
    }

    fn compile_list(&self, commands: Vec<Command>) -> Result<ListId, BackendError> {
        let id = self.allocate("display list")?;
        let mut state = self.state.borrow_mut();
        state.lists.insert(id, commands);
        state.compiles += 1;
        Ok(ListId(id))
    }

    fn release_list(&self, list: ListId) {
        self.state.borrow_mut().lists.remove(&list.0);
    }

    fn submit(&self, command: Command) {
        self.state.borrow_mut().commands.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Canvas;
    use std::rc::Rc;

    #[test]
    fn newer_versions_are_rejected() {
        let recorder = Recorder::new().with_max_version(2, 1);
        let err = recorder.activate(&ContextSettings::default()).unwrap_err();
        assert_eq!(
            err,
            BackendError::UnsupportedVersion {
                requested: (2, 9),
                available: (2, 1)
            }
        );
        assert!(recorder.settings().is_none());
    }

    #[test]
    fn allocation_requires_a_context() {
        let recorder = Recorder::new();
        assert_eq!(recorder.create_texture(), Err(BackendError::NoContext));
    }

    #[test]
    fn guards_release_lists() {
        let recorder = Rc::new(Recorder::new());
        recorder.activate(&ContextSettings::default()).unwrap();
        let canvas = Canvas::new(recorder.clone());
        let list = canvas.compile(vec![Command::Blend(true)]).unwrap();
        assert_eq!(recorder.list(list.id()), Some(vec![Command::Blend(true)]));
        list.call();
        assert_eq!(recorder.take_commands(), vec![Command::CallList(list.id())]);
        drop(list);
        assert_eq!(recorder.live_lists(), 0);
        assert_eq!(recorder.compiles(), 1);
    }

    #[test]
    fn failing_recorder_reports_resource_errors() {
        let recorder = Recorder::failing();
        recorder.activate(&ContextSettings::default()).unwrap();
        assert_eq!(
            recorder.compile_list(Vec::new()),
            Err(BackendError::OutOfResources("display list"))
        );
    }

    #[test]
    fn mismatched_uploads_fail() {
        let recorder = Rc::new(Recorder::new());
        recorder.activate(&ContextSettings::default()).unwrap();
        let canvas = Canvas::new(recorder.clone());
        let texture = canvas.create_texture().unwrap();
        assert!(texture.upload(2, 2, &[0; 4]).is_err());
        texture.upload(2, 1, &[0; 8]).unwrap();
        assert_eq!(recorder.texture_size(texture.id()), Some((2, 1)));
        assert_eq!(recorder.uploads(), 1);
    }
}
