//! Plan schema: the structural data contracts every pipeline stage reads
//! and writes.

pub mod lesson;
pub mod media;
pub mod requirements;
pub mod worksheet;

pub use lesson::{
    LessonMetadata, LessonPlanStructure, LessonSection, MaterialItem, ScriptCue, ScriptEntry,
};
pub use media::{
    ImagePlacement, ImagePurpose, ImageResult, ImageSize, PLACEHOLDER_PREFIX, Richness,
    VisualSettings,
};
pub use requirements::{GradeLevel, ValidationRequirements};
pub use worksheet::{
    Difficulty, ItemType, PlanMetadata, PlanStructure, PlanStyle, WorksheetHeader, WorksheetItem,
    WorksheetPlan, WorksheetSection,
};
