//! Ordered ownership of the native pipeline handles.
//!
//! The three handles of a filtering run depend on each other: the decoder is
//! built from the container's stream parameters, and the filter graph from
//! the decoder's negotiated format. [`Resources`] accepts them only in that
//! order and releases them in reverse, whichever way the run ends. Each
//! handle type releases its native resource in its own `Drop`, so releasing
//! a slot here means dropping its value.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::error::VidfilterError;

/// Holds the container, decoder and filter graph of one run.
///
/// Slots are filled with the `acquire_*` methods and emptied, graph first,
/// by [`release_all`](Resources::release_all) or on drop. Empty slots are
/// skipped, so a run that failed halfway releases exactly what it acquired.
pub struct Resources<C, D, G> {
    container: Option<C>,
    decoder: Option<D>,
    graph: Option<G>,
}

impl<C, D, G> Resources<C, D, G> {
    /// An empty set of slots.
    pub fn new() -> Self {
        Self {
            container: None,
            decoder: None,
            graph: None,
        }
    }

    /// Take ownership of the opened container.
    ///
    /// # Errors
    ///
    /// [`VidfilterError::LifecycleOrder`] if any handle is already held.
    pub fn acquire_container(&mut self, container: C) -> Result<&mut C, VidfilterError> {
        if self.container.is_some() || self.decoder.is_some() || self.graph.is_some() {
            return Err(VidfilterError::LifecycleOrder(
                "container acquired after other handles",
            ));
        }
        log::debug!("Acquired container");
        Ok(self.container.insert(container))
    }

    /// Take ownership of the opened decoder.
    ///
    /// # Errors
    ///
    /// [`VidfilterError::LifecycleOrder`] unless exactly the container is held.
    pub fn acquire_decoder(&mut self, decoder: D) -> Result<&mut D, VidfilterError> {
        if self.container.is_none() {
            return Err(VidfilterError::LifecycleOrder(
                "decoder acquired before container",
            ));
        }
        if self.decoder.is_some() || self.graph.is_some() {
            return Err(VidfilterError::LifecycleOrder("decoder acquired twice"));
        }
        log::debug!("Acquired decoder");
        Ok(self.decoder.insert(decoder))
    }

    /// Take ownership of the configured filter graph.
    ///
    /// # Errors
    ///
    /// [`VidfilterError::LifecycleOrder`] unless the container and decoder
    /// are held and no graph is.
    pub fn acquire_graph(&mut self, graph: G) -> Result<&mut G, VidfilterError> {
        if self.decoder.is_none() {
            return Err(VidfilterError::LifecycleOrder(
                "filter graph acquired before decoder",
            ));
        }
        if self.graph.is_some() {
            return Err(VidfilterError::LifecycleOrder("filter graph acquired twice"));
        }
        log::debug!("Acquired filter graph");
        Ok(self.graph.insert(graph))
    }

    /// The container, if acquired.
    pub fn container(&self) -> Option<&C> {
        self.container.as_ref()
    }

    /// The decoder, if acquired.
    pub fn decoder(&self) -> Option<&D> {
        self.decoder.as_ref()
    }

    /// The filter graph, if acquired.
    pub fn graph(&self) -> Option<&G> {
        self.graph.as_ref()
    }

    /// Mutable access to all three handles at once.
    ///
    /// # Errors
    ///
    /// [`VidfilterError::LifecycleOrder`] unless all three are held.
    pub fn parts_mut(&mut self) -> Result<(&mut C, &mut D, &mut G), VidfilterError> {
        match (&mut self.container, &mut self.decoder, &mut self.graph) {
            (Some(container), Some(decoder), Some(graph)) => Ok((container, decoder, graph)),
            _ => Err(VidfilterError::LifecycleOrder(
                "pipeline used before setup completed",
            )),
        }
    }

    /// Release every held handle, graph first, container last.
    ///
    /// Calling this again, or dropping afterwards, releases nothing more.
    pub fn release_all(&mut self) {
        if let Some(graph) = self.graph.take() {
            log::debug!("Releasing filter graph");
            drop(graph);
        }
        if let Some(decoder) = self.decoder.take() {
            log::debug!("Releasing decoder");
            drop(decoder);
        }
        if let Some(container) = self.container.take() {
            log::debug!("Releasing container");
            drop(container);
        }
    }
}

impl<C, D, G> Default for Resources<C, D, G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, D, G> Drop for Resources<C, D, G> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl<C, D, G> Debug for Resources<C, D, G> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Resources")
            .field("container", &self.container.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("graph", &self.graph.is_some())
            .finish()
    }
}
