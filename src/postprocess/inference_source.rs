use std::time::Instant;
use ndarray::Array2;
use crate::common::{ImageGeometry, PostprocessConfig};
use crate::postprocess::{postprocess, PostprocessOutput};

/// An external inference engine that turns an input into a `(N, 5 + C)` detection tensor.
///
/// Model construction, checkpoint loading and graph execution live behind this trait; the
/// crate only consumes the tensor it returns.
pub trait InferenceSource {
    type Input;

    /// Short name used in logs and reports, e.g. `"pytorch"` or `"onnx"`.
    fn name(&self) -> String;

    /// Executes the model and returns one batch element of its output.
    fn inference(&mut self, x: &Self::Input) -> anyhow::Result<Array2<f32>>;

    /// Executes inference followed by decode, filter and NMS.
    fn run(
        &mut self,
        x: &Self::Input,
        geometry: &ImageGeometry,
        config: &PostprocessConfig,
    ) -> anyhow::Result<PostprocessOutput> {
        let ys = self.inference(x)?;
        Ok(postprocess(ys.view(), geometry, config)?)
    }

    /// Same as [`InferenceSource::run`], also logging the time spent in each half.
    fn forward(
        &mut self,
        x: &Self::Input,
        geometry: &ImageGeometry,
        config: &PostprocessConfig,
        profile: bool,
    ) -> anyhow::Result<PostprocessOutput> {
        let t_exe = Instant::now();
        let ys = self.inference(x)?;
        let t_exe = t_exe.elapsed();

        let t_post = Instant::now();
        let ys = postprocess(ys.view(), geometry, config)?;
        let t_post = t_post.elapsed();

        if profile {
            log::info!("> [{}] Inference: {t_exe:?} | Postprocess: {t_post:?}", self.name());
        }

        Ok(ys)
    }
}
