pub type StrataResult<T> = Result<T, StrataError>;

/// Generic error that contains all the different kinds of errors that may occur while setting up
/// render stages and plugins or while driving a frame through them
#[derive(Debug, Clone, PartialEq)]
pub enum StrataError {
    StringError(String),
    /// A render stage was referenced by name or handle but is not registered
    UnknownRenderStage(String),
    /// A render stage with the same name is already registered
    DuplicateRenderStage(String),
    /// Every render stage index is in use
    TooManyRenderStages(u32),
    /// The render stage is still referenced by a selector, processor, or filter
    RenderStageInUse(String),
    UnknownRenderObjectType(&'static str),
    DuplicateRenderObjectType(&'static str),
    /// The view/stage combination requested does not exist in the current frame
    UnknownViewStage {
        view: String,
        stage: String,
    },
    /// Loading the plugins in this chain would require a plugin to load itself
    PluginCycle(Vec<&'static str>),
    PluginNotLoaded(&'static str),
    /// Collect output gathered for another frame (or for an abandoned one) was handed to the
    /// frame in flight
    StaleCollectOutput {
        output_frame: u64,
        current_frame: u64,
    },
    /// A frame phase was invoked out of order (i.e. collect before before_extract)
    FrameOutOfOrder {
        requested: &'static str,
        current: &'static str,
    },
}

impl std::error::Error for StrataError {}

impl core::fmt::Display for StrataError {
    fn fmt(
        &self,
        fmt: &mut core::fmt::Formatter,
    ) -> core::fmt::Result {
        match *self {
            StrataError::StringError(ref e) => e.fmt(fmt),
            StrataError::UnknownRenderStage(ref name) => {
                write!(fmt, "render stage {} is not registered", name)
            }
            StrataError::DuplicateRenderStage(ref name) => {
                write!(fmt, "render stage {} is already registered", name)
            }
            StrataError::TooManyRenderStages(max) => {
                write!(fmt, "cannot register more than {} render stages", max)
            }
            StrataError::RenderStageInUse(ref name) => write!(
                fmt,
                "render stage {} is still referenced by a selector, processor, or filter",
                name
            ),
            StrataError::UnknownRenderObjectType(name) => {
                write!(fmt, "render object type {} is not registered", name)
            }
            StrataError::DuplicateRenderObjectType(name) => {
                write!(fmt, "render object type {} is already registered", name)
            }
            StrataError::UnknownViewStage {
                ref view,
                ref stage,
            } => write!(
                fmt,
                "requested render view {} / render stage {} combination doesn't exist",
                view, stage
            ),
            StrataError::PluginCycle(ref chain) => {
                write!(fmt, "pipeline plugin cycle: {}", chain.join(" -> "))
            }
            StrataError::PluginNotLoaded(name) => {
                write!(fmt, "pipeline plugin {} is not loaded", name)
            }
            StrataError::StaleCollectOutput {
                output_frame,
                current_frame,
            } => write!(
                fmt,
                "collect output of frame {} cannot be merged into frame {}",
                output_frame, current_frame
            ),
            StrataError::FrameOutOfOrder { requested, current } => write!(
                fmt,
                "{} was requested while the frame is in the {} phase",
                requested, current
            ),
        }
    }
}

impl From<&str> for StrataError {
    fn from(str: &str) -> Self {
        StrataError::StringError(str.to_string())
    }
}

impl From<String> for StrataError {
    fn from(string: String) -> Self {
        StrataError::StringError(string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_cycle_lists_the_chain() {
        let error = StrataError::PluginCycle(vec!["A", "B", "A"]);
        assert_eq!(error.to_string(), "pipeline plugin cycle: A -> B -> A");
    }

    #[test]
    fn string_conversions() {
        let error: StrataError = "boom".into();
        assert_eq!(error, StrataError::StringError("boom".to_string()));
    }
}
