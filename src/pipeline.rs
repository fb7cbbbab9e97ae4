//! One complete filtering run.
//!
//! [`VideoFilter`] opens the input, builds the filter graph from the
//! decoder's negotiated parameters, pumps every packet of the selected
//! stream through both, and releases the native handles in reverse order of
//! acquisition, whichever way the run ends.
//!
//! # Example
//!
//! ```no_run
//! use vidfilter::{FilterOptions, VideoFilter};
//!
//! let stats = VideoFilter::new(FilterOptions::new())
//!     .run("input.mp4", &mut vidfilter::Discard)?;
//! println!("{} frames filtered", stats.frames_filtered);
//! # Ok::<(), vidfilter::VidfilterError>(())
//! ```

use std::path::Path;

use crate::config::FilterOptions;
use crate::consumer::{Discard, FrameConsumer};
use crate::error::VidfilterError;
use crate::graph::{FilterGraph, SourceParameters};
use crate::input::{Container, Decoder, open_input};
use crate::lifecycle::Resources;
use crate::pump::{FrameBuffers, FramePump, PumpStats};

/// Runs a filter description over the best video stream of a file.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    options: FilterOptions,
}

impl VideoFilter {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Filter every frame of `path`'s best video stream into `consumer`.
    ///
    /// Returns once the input is exhausted. Frames still buffered in the
    /// decoder or graph at that point are only emitted when
    /// [`FilterOptions::with_drain_at_end_of_stream`] is set.
    ///
    /// # Errors
    ///
    /// - [`VidfilterError::FileNotFound`] before anything is allocated if
    ///   `path` is not an existing file.
    /// - Any setup error of [`open_input`] or [`FilterGraph::build`].
    /// - Any pump error of [`FramePump::run`], including consumer errors.
    pub fn run<P, C>(&self, path: P, consumer: &mut C) -> Result<PumpStats, VidfilterError>
    where
        P: AsRef<Path>,
        C: FrameConsumer + ?Sized,
    {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VidfilterError::FileNotFound(path.to_path_buf()));
        }

        ffmpeg_next::init()?;

        let mut buffers = FrameBuffers::allocate()?;
        let mut resources: Resources<Container, Decoder, FilterGraph> = Resources::new();

        let result = self.run_with(path, &mut resources, &mut buffers, consumer);
        resources.release_all();
        result
    }

    fn run_with<C>(
        &self,
        path: &Path,
        resources: &mut Resources<Container, Decoder, FilterGraph>,
        buffers: &mut FrameBuffers,
        consumer: &mut C,
    ) -> Result<PumpStats, VidfilterError>
    where
        C: FrameConsumer + ?Sized,
    {
        let stream = open_input(path, resources)?;

        let decoder = resources
            .decoder()
            .ok_or(VidfilterError::LifecycleOrder("decoder missing after open"))?;
        let parameters = SourceParameters::from_decoder(decoder, stream.time_base);
        let graph = FilterGraph::build(
            self.options.filter_description(),
            &parameters,
            self.options.output_pixel_formats(),
        )?;
        resources.acquire_graph(graph)?;

        let (container, decoder, graph) = resources.parts_mut()?;
        FramePump::new(stream.index)
            .with_drain_at_end_of_stream(self.options.drain_at_end_of_stream())
            .run(container, decoder, graph, consumer, buffers)
    }
}

/// Run `description` over `path` and discard the filtered frames.
///
/// # Errors
///
/// As [`VideoFilter::run`].
pub fn filter_video<P: AsRef<Path>>(path: P, description: &str) -> Result<PumpStats, VidfilterError> {
    VideoFilter::new(FilterOptions::new().with_filter_description(description))
        .run(path, &mut Discard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_fails_before_setup() {
        let error = VideoFilter::default()
            .run("no/such/input.mp4", &mut Discard)
            .unwrap_err();
        assert!(matches!(error, VidfilterError::FileNotFound(_)));
    }

    #[test]
    fn one_call_form_uses_the_description() {
        let error = filter_video("no/such/input.mp4", "hflip").unwrap_err();
        assert!(error.to_string().contains("no/such/input.mp4"));
    }

    #[test]
    fn garbage_input_is_a_setup_error() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("noise.mkv");
        std::fs::write(&path, [0x5a_u8; 4096]).unwrap();

        let error = VideoFilter::default().run(&path, &mut Discard).unwrap_err();
        assert!(matches!(
            error,
            VidfilterError::InputOpen { .. } | VidfilterError::StreamInfo { .. }
        ));
    }
}
