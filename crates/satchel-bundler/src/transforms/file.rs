use super::{Payload, Transform, TransformContext};

/// Emit the bytes unchanged; only the output template applies.
pub struct FileTransform;

impl Transform for FileTransform {
    fn name(&self) -> &'static str {
        "file"
    }

    fn apply(&self, payload: Payload, _ctx: &TransformContext) -> anyhow::Result<Vec<Payload>> {
        Ok(vec![payload])
    }
}
