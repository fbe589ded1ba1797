use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use serde_json::Value;

use crate::events::{AudioPhase, AudioSignal};
use crate::identifiers::TaskId;

/// Whatever actually turns speech payloads into sound.
pub trait AudioPlayer: Send + Sync {
    fn begin(&self, task_id: &TaskId, header: &Value);
    fn append(&self, task_id: &TaskId, chunk: &Value);
    /// The stream ended normally; `chunks` is everything received for it.
    fn finish(&self, task_id: &TaskId, chunks: &[Value]);
    /// Drop playback for `task_id` without waiting for the stream to end.
    fn stop(&self, task_id: &TaskId);
}

/// Player that only logs. Used when nothing can play audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl AudioPlayer for SilentPlayer {
    fn begin(&self, task_id: &TaskId, _header: &Value) {
        debug!("[audio] speech stream for {task_id} started");
    }

    fn append(&self, _task_id: &TaskId, _chunk: &Value) {}

    fn finish(&self, task_id: &TaskId, chunks: &[Value]) {
        debug!("[audio] speech stream for {task_id} ended after {} chunks", chunks.len());
    }

    fn stop(&self, task_id: &TaskId) {
        debug!("[audio] speech stream for {task_id} stopped");
    }
}

#[derive(Debug, Default)]
struct SpeechBuffer {
    chunks: Vec<Value>,
}

/// Keeps one speech buffer per generation task and relays signals to an
/// [`AudioPlayer`]. Buffers live until their stream ends or the owning view
/// releases them.
#[derive(Clone)]
pub struct AudioRelay {
    player: Arc<dyn AudioPlayer>,
    buffers: Arc<Mutex<HashMap<TaskId, SpeechBuffer>>>,
}

impl AudioRelay {
    pub fn new(player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            player,
            buffers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn buffers(&self) -> MutexGuard<'_, HashMap<TaskId, SpeechBuffer>> {
        // A panicking player must not wedge teardown.
        self.buffers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn accept(&self, signal: &AudioSignal) {
        let task_id = &signal.task_id;
        match signal.phase {
            AudioPhase::Started => {
                let previous = self.buffers().insert(task_id.clone(), SpeechBuffer::default());
                if previous.is_some() {
                    warn!("[audio] speech stream for {task_id} restarted");
                    self.player.stop(task_id);
                }
                self.player.begin(task_id, &signal.payload);
            }
            AudioPhase::Chunk => {
                {
                    let mut buffers = self.buffers();
                    let buffer = buffers.entry(task_id.clone()).or_default();
                    buffer.chunks.push(signal.payload.clone());
                }
                self.player.append(task_id, &signal.payload);
            }
            AudioPhase::Ended => match self.buffers().remove(task_id) {
                Some(buffer) => self.player.finish(task_id, &buffer.chunks),
                None => debug!("[audio] end of unknown speech stream {task_id}"),
            },
        }
    }

    pub fn release(&self, task_id: &TaskId) {
        if self.buffers().remove(task_id).is_some() {
            self.player.stop(task_id);
        }
    }

    /// Stops and drops every buffered stream. Called on unmount and subject
    /// change, whether or not a stream was mid-flight.
    pub fn release_all(&self) {
        let drained: Vec<TaskId> = self.buffers().drain().map(|(task_id, _)| task_id).collect();
        for task_id in &drained {
            self.player.stop(task_id);
        }
        if !drained.is_empty() {
            debug!("[audio] released {} speech buffers", drained.len());
        }
    }

    pub fn active_streams(&self) -> usize {
        self.buffers().len()
    }
}
