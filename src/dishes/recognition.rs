use std::path::Path;
use std::sync::Arc;

use base64ct::{Base64, Encoding};
use bytes::Bytes;
use time::Date;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::{Dish, DishCatalog, MealType, NewDish, RecognitionResult, RecognizeRequest, RecognizedDish};
use crate::error::{ClientError, ClientResult};

/// Uploads above this size are refused before anything is sent.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

const TOO_LARGE: &str = "File is too large. Maximum size is 10MB.";

/// A photo picked for recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedImage {
    content_type: String,
    body: Bytes,
}

impl SelectedImage {
    pub fn new(body: impl Into<Bytes>, content_type: &str) -> ClientResult<Self> {
        let body = body.into();
        if body.len() as u64 > MAX_IMAGE_BYTES {
            return Err(ClientError::validation("image", TOO_LARGE));
        }
        Ok(Self {
            content_type: content_type.to_string(),
            body,
        })
    }

    /// Reads an image from disk. The size is checked from metadata so an
    /// oversized file is never read into memory.
    pub async fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        if meta.len() > MAX_IMAGE_BYTES {
            return Err(ClientError::validation("image", TOO_LARGE));
        }
        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_from_ext)
            .ok_or_else(|| ClientError::validation("image", "Unsupported image type"))?;
        let body = tokio::fs::read(path).await?;
        Self::new(body, content_type)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// `data:<mime>;base64,<payload>`, the form the recognizer expects.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            Base64::encode_string(&self.body)
        )
    }
}

fn mime_from_ext(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionStage {
    NoImage,
    ImageSelected(SelectedImage),
    Recognized(RecognitionResult),
}

/// Photo to dishes: pick an image, recognize it, then add any of the
/// candidates to a meal.
pub struct RecognizeDishFlow {
    catalog: Arc<dyn DishCatalog>,
    date: Date,
    stage: RecognitionStage,
    error: Option<String>,
}

impl RecognizeDishFlow {
    pub fn new(catalog: Arc<dyn DishCatalog>, date: Date) -> Self {
        Self {
            catalog,
            date,
            stage: RecognitionStage::NoImage,
            error: None,
        }
    }

    pub fn stage(&self) -> &RecognitionStage {
        &self.stage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn candidates(&self) -> &[RecognizedDish] {
        match &self.stage {
            RecognitionStage::Recognized(result) => &result.recognized_dishes,
            _ => &[],
        }
    }

    /// Oversized images are rejected and the current stage is left as is.
    pub fn select_image(&mut self, body: impl Into<Bytes>, content_type: &str) -> ClientResult<()> {
        let image = SelectedImage::new(body, content_type).map_err(|e| self.fail(e))?;
        self.accept(image);
        Ok(())
    }

    pub async fn select_file(&mut self, path: impl AsRef<Path>) -> ClientResult<()> {
        let image = SelectedImage::load(path).await.map_err(|e| self.fail(e))?;
        self.accept(image);
        Ok(())
    }

    fn accept(&mut self, image: SelectedImage) {
        debug!(bytes = image.len(), content_type = %image.content_type, "image selected");
        self.error = None;
        self.stage = RecognitionStage::ImageSelected(image);
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        self.error = Some(err.user_message());
        err
    }

    /// Sends the selected image. On failure the image is dropped and the
    /// flow returns to `NoImage` with the error kept for display.
    #[instrument(skip(self), fields(date = %self.date))]
    pub async fn recognize(&mut self) -> ClientResult<&[RecognizedDish]> {
        let selected = match &self.stage {
            RecognitionStage::ImageSelected(image) => Some(image.data_url()),
            _ => None,
        };
        let Some(data_url) = selected else {
            return Err(self.fail(ClientError::validation("image", "Select an image first")));
        };
        let request = RecognizeRequest {
            image_base64: data_url,
            date: Some(self.date),
            meal_type: None,
        };
        self.error = None;

        match self.catalog.recognize(&request).await {
            Ok(result) => {
                info!(candidates = result.recognized_dishes.len(), "image recognized");
                self.stage = RecognitionStage::Recognized(result);
                Ok(self.candidates())
            }
            Err(e) => {
                warn!(error = %e, "recognition failed");
                self.stage = RecognitionStage::NoImage;
                Err(self.fail(e))
            }
        }
    }

    /// Creates one candidate as a dish in the given meal. Can be called
    /// any number of times per result.
    pub async fn add_candidate(&self, index: usize, meal_type: MealType) -> ClientResult<Dish> {
        let candidate = self
            .candidates()
            .get(index)
            .ok_or_else(|| ClientError::validation("candidate", "No such recognized dish"))?;
        create_candidate(self.catalog.as_ref(), candidate, self.date, meal_type).await
    }

    /// Creates several candidates at once. Results come back in the order
    /// of `picks`; a failed create does not affect the others.
    pub async fn add_candidates(&self, picks: &[(usize, MealType)]) -> Vec<ClientResult<Dish>> {
        let mut set = JoinSet::new();
        for (slot, &(index, meal_type)) in picks.iter().enumerate() {
            let catalog = Arc::clone(&self.catalog);
            let candidate = self.candidates().get(index).cloned();
            let date = self.date;
            set.spawn(async move {
                let outcome = match candidate {
                    Some(c) => create_candidate(catalog.as_ref(), &c, date, meal_type).await,
                    None => Err(ClientError::validation("candidate", "No such recognized dish")),
                };
                (slot, outcome)
            });
        }

        let mut out: Vec<Option<ClientResult<Dish>>> = picks.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, outcome)) => out[slot] = Some(outcome),
                Err(e) => warn!(error = %e, "candidate create task failed"),
            }
        }
        out.into_iter()
            .map(|o| {
                o.unwrap_or_else(|| {
                    Err(ClientError::validation("candidate", "Create was interrupted"))
                })
            })
            .collect()
    }

    /// Back to image selection, e.g. "try another photo".
    pub fn restart(&mut self) {
        self.stage = RecognitionStage::NoImage;
        self.error = None;
    }
}

async fn create_candidate(
    catalog: &dyn DishCatalog,
    candidate: &RecognizedDish,
    date: Date,
    meal_type: MealType,
) -> ClientResult<Dish> {
    let dish = NewDish::new(
        candidate.name.clone(),
        date,
        meal_type,
        candidate.weight,
        candidate.macros(),
    );
    let result = catalog.create(&dish).await;
    if let Err(e) = &result {
        warn!(name = %candidate.name, error = %e, "candidate create failed");
    }
    result
}

#[cfg(test)]
mod recognition_tests {
    use time::macros::date;

    use super::*;
    use crate::dishes::fake::FakeCatalog;

    fn result() -> RecognitionResult {
        RecognitionResult {
            recognized_dishes: vec![
                RecognizedDish {
                    name: "Борщ".into(),
                    weight: 300,
                    calories: 180.0,
                    proteins: 6.5,
                    fats: 7.0,
                    carbohydrates: 20.1,
                    confidence: Some(0.82),
                },
                RecognizedDish {
                    name: "Хлеб".into(),
                    weight: 50,
                    calories: 130.0,
                    proteins: 4.0,
                    fats: 1.0,
                    carbohydrates: 25.0,
                    confidence: None,
                },
            ],
            suggested_date: None,
            suggested_meal_type: Some(MealType::Lunch),
        }
    }

    fn flow(catalog: &Arc<FakeCatalog>) -> RecognizeDishFlow {
        RecognizeDishFlow::new(catalog.clone(), date!(2024 - 01 - 15))
    }

    #[test]
    fn data_url_keeps_prefix() {
        let image = SelectedImage::new(vec![0xff, 0xd8, 0xff], "image/jpeg").unwrap();
        assert_eq!(image.data_url(), "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_from_ext("JPG"), Some("image/jpeg"));
        assert_eq!(mime_from_ext("png"), Some("image/png"));
        assert_eq!(mime_from_ext("bmp"), None);
    }

    #[test]
    fn size_limit_is_inclusive() {
        let at_limit = SelectedImage::new(vec![0u8; MAX_IMAGE_BYTES as usize], "image/png");
        assert_eq!(at_limit.unwrap().len() as u64, MAX_IMAGE_BYTES);

        let err = SelectedImage::new(vec![0u8; MAX_IMAGE_BYTES as usize + 1], "image/png")
            .unwrap_err();
        assert_eq!(err.user_message(), TOO_LARGE);
    }

    #[tokio::test]
    async fn eleven_megabytes_is_rejected_without_upload() {
        let catalog = Arc::new(FakeCatalog::recognizing(result()));
        let mut flow = flow(&catalog);

        let big = vec![0u8; 11 * 1024 * 1024];
        let err = flow.select_image(big, "image/png").unwrap_err();

        assert!(matches!(err, ClientError::Validation { field: "image", .. }));
        assert_eq!(flow.error(), Some(TOO_LARGE));
        assert_eq!(flow.stage(), &RecognitionStage::NoImage);
        assert!(flow.recognize().await.is_err());
        assert!(catalog.recognize_requests().is_empty());
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_from_metadata() {
        let dir = std::env::temp_dir().join(format!("calorio-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("big.jpg");
        let file = tokio::fs::File::create(&path).await.unwrap();
        file.set_len(MAX_IMAGE_BYTES + 1).await.unwrap();

        let err = SelectedImage::load(&path).await.unwrap_err();
        assert_eq!(err.user_message(), TOO_LARGE);

        let exact = dir.join("exact.jpg");
        let file = tokio::fs::File::create(&exact).await.unwrap();
        file.set_len(MAX_IMAGE_BYTES).await.unwrap();
        drop(file);
        let image = SelectedImage::load(&exact).await.unwrap();
        assert_eq!(image.content_type(), "image/jpeg");
        assert_eq!(image.len() as u64, MAX_IMAGE_BYTES);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn recognize_sends_data_url_and_date() {
        let catalog = Arc::new(FakeCatalog::recognizing(result()));
        let mut flow = flow(&catalog);

        flow.select_image(vec![1u8, 2, 3], "image/png").unwrap();
        let found = flow.recognize().await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(flow.candidates()[0].confidence_percent(), Some(82));

        let sent = catalog.recognize_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].image_base64, "data:image/png;base64,AQID");
        assert_eq!(sent[0].date, Some(date!(2024 - 01 - 15)));
    }

    #[tokio::test]
    async fn failed_recognition_returns_to_image_selection() {
        let catalog = Arc::new(FakeCatalog::failing());
        let mut flow = flow(&catalog);

        flow.select_image(vec![1u8, 2, 3], "image/png").unwrap();
        assert!(flow.recognize().await.is_err());

        assert_eq!(flow.stage(), &RecognitionStage::NoImage);
        assert_eq!(flow.error(), Some(FakeCatalog::NOT_FOUND_DETAIL));
    }

    #[tokio::test]
    async fn each_candidate_can_go_to_its_own_meal() {
        let catalog = Arc::new(FakeCatalog::recognizing(result()));
        let mut flow = flow(&catalog);
        flow.select_image(vec![1u8], "image/jpeg").unwrap();
        flow.recognize().await.unwrap();

        flow.add_candidate(0, MealType::Lunch).await.unwrap();
        flow.add_candidate(0, MealType::Dinner).await.unwrap();
        flow.add_candidate(1, MealType::Snack).await.unwrap();

        let created = catalog.created();
        assert_eq!(created.len(), 3);
        assert_eq!(created[0].meal_type, MealType::Lunch);
        assert_eq!(created[1].meal_type, MealType::Dinner);
        assert_eq!(created[2].name, "Хлеб");
        assert_eq!(created[2].weight, Some(50));
        assert_eq!(created[2].date, date!(2024 - 01 - 15));
    }

    #[tokio::test]
    async fn one_failed_create_does_not_block_the_rest() {
        let catalog = Arc::new(FakeCatalog::recognizing(result()).rejecting("Борщ"));
        let mut flow = flow(&catalog);
        flow.select_image(vec![1u8], "image/jpeg").unwrap();
        flow.recognize().await.unwrap();

        let outcomes = flow
            .add_candidates(&[(0, MealType::Lunch), (1, MealType::Lunch), (5, MealType::Lunch)])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(
            outcomes[0].as_ref().unwrap_err().user_message(),
            "Dish name is not allowed."
        );
        assert_eq!(outcomes[1].as_ref().unwrap().name, "Хлеб");
        assert!(outcomes[2].is_err());
        assert_eq!(catalog.created().len(), 1);
    }

    #[test]
    fn restart_clears_result() {
        let catalog = Arc::new(FakeCatalog::recognizing(result()));
        let mut flow = flow(&catalog);
        flow.select_image(vec![1u8], "image/jpeg").unwrap();
        flow.restart();
        assert_eq!(flow.stage(), &RecognitionStage::NoImage);
        assert!(flow.candidates().is_empty());
    }
}
