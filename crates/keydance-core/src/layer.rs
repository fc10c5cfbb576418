// Keydance Layer Return
// Nested temporary layer switches that all return to the layer they started from

use crate::host::LayerService;

/// Remembers where to return after one or more temporary layer switches.
///
/// The first push records the highest active layer. Later pushes only bump
/// the count, and the layer is restored when the last push is undone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerReturn {
    return_layer: Option<u8>,
    count: u8,
}

impl LayerReturn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to `layer`, remembering the current one if this is the
    /// outermost switch
    pub fn push<L: LayerService + ?Sized>(&mut self, layers: &mut L, layer: u8) {
        self.count = self.count.saturating_add(1);
        if self.return_layer.is_none() {
            self.return_layer = Some(layers.highest_layer());
        }
        log::debug!(
            "layer push {} (return to {:?}, depth {})",
            layer,
            self.return_layer,
            self.count
        );
        layers.layer_move(layer);
    }

    /// Undo one push. The remembered layer comes back when the count hits zero.
    pub fn restore<L: LayerService + ?Sized>(&mut self, layers: &mut L) {
        if self.count == 0 {
            return;
        }
        self.count -= 1;
        if self.count == 0 {
            if let Some(layer) = self.return_layer.take() {
                log::debug!("layer restore {}", layer);
                layers.layer_move(layer);
            }
        }
    }

    pub fn depth(&self) -> u8 {
        self.count
    }

    pub fn return_layer(&self) -> Option<u8> {
        self.return_layer
    }
}
