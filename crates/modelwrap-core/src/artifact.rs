use std::path::PathBuf;

#[derive(Clone, Debug)]
pub enum ModelArtifact {
    OnnxPath(PathBuf),
    /// JSON manifest holding the weights of a dense feed-forward network.
    DenseJson(PathBuf),
}

impl ModelArtifact {
    pub fn path(&self) -> &std::path::Path {
        match self {
            ModelArtifact::OnnxPath(path) | ModelArtifact::DenseJson(path) => path,
        }
    }
}
