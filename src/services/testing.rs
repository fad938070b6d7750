use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::services::api::{ApiError, BlogApi};
use crate::services::models::*;

/// In-memory `BlogApi` that records every call.
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<String>>,
    options: Mutex<Vec<String>>,
    outlines: Mutex<Vec<Vec<String>>>,
    generation_error: Mutex<Option<ApiError>>,
    contexts: Mutex<Vec<GenerationContext>>,

    pub summaries: Mutex<Vec<BlogSummary>>,
    pub records: Mutex<HashMap<String, BlogRecord>>,
    pub failing_ids: Mutex<HashSet<String>>,
    pub final_blog: Mutex<FinalBlog>,
    pub generate_requests: Mutex<Vec<GenerateBlogRequest>>,
    pub saved: Mutex<Vec<BlogCreateRequest>>,
    pub updates: Mutex<Vec<(String, BlogCreateRequest)>>,
    pub deleted: Mutex<Vec<String>>,
    pub images: Mutex<Vec<GalleryImage>>,
    pub image_requests: Mutex<Vec<ImageGenerateRequest>>,
    pub saved_images: Mutex<Vec<ImageSaveRequest>>,
    pub uploads: Mutex<Vec<(String, usize)>>,
    pub stats: Mutex<BlogStats>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_options(&self, options: &[&str]) {
        *self.options.lock().unwrap() = options.iter().map(|s| s.to_string()).collect();
        *self.generation_error.lock().unwrap() = None;
    }

    pub fn set_outlines(&self, outlines: Vec<Vec<String>>) {
        *self.outlines.lock().unwrap() = outlines;
        *self.generation_error.lock().unwrap() = None;
    }

    pub fn fail_generation(&self, err: ApiError) {
        *self.generation_error.lock().unwrap() = Some(err);
    }

    pub fn with_summaries(self, summaries: Vec<BlogSummary>) -> Self {
        *self.summaries.lock().unwrap() = summaries;
        self
    }

    pub fn add_record(&self, record: BlogRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub fn fail_id(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_context(&self) -> Option<GenerationContext> {
        self.contexts.lock().unwrap().last().cloned()
    }

    fn record_call(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_id(&self, id: &str) -> Result<(), ApiError> {
        if self.failing_ids.lock().unwrap().contains(id) {
            return Err(ApiError::Server {
                status: 500,
                message: format!("Failed on {}", id),
            });
        }
        Ok(())
    }

    fn generated(&self, ctx: &GenerationContext) -> Result<(), ApiError> {
        self.contexts.lock().unwrap().push(ctx.clone());
        match self.generation_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn token() -> AuthToken {
        AuthToken {
            access_token: "token".into(),
            token_type: "bearer".into(),
            user: None,
        }
    }
}

#[async_trait]
impl BlogApi for MockApi {
    async fn login(&self, req: &LoginRequest) -> Result<AuthToken, ApiError> {
        self.record_call(format!("login {}", req.email));
        Ok(Self::token())
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthToken, ApiError> {
        self.record_call(format!("signup {}", req.email));
        Ok(Self::token())
    }

    async fn list_blogs(&self, page: u32, limit: u32) -> Result<BlogPage, ApiError> {
        self.record_call(format!("list_blogs {} {}", page, limit));
        let all = self.summaries.lock().unwrap().clone();
        let start = (page.saturating_sub(1) * limit) as usize;
        let items = all
            .iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(BlogPage {
            items,
            page,
            limit,
            total: Some(all.len() as u64),
        })
    }

    async fn get_blog(&self, id: &str) -> Result<BlogRecord, ApiError> {
        self.record_call(format!("get_blog {}", id));
        self.check_id(id)?;
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::Server {
                status: 404,
                message: "Blog not found".into(),
            })
    }

    async fn save_blog(&self, req: &BlogCreateRequest) -> Result<SavedBlog, ApiError> {
        self.record_call("save_blog".into());
        self.saved.lock().unwrap().push(req.clone());
        Ok(SavedBlog {
            blog_id: "new-blog".into(),
            status: Some(BlogStatus::Saved),
        })
    }

    async fn update_blog(&self, id: &str, req: &BlogCreateRequest) -> Result<(), ApiError> {
        self.record_call(format!("update_blog {}", id));
        self.check_id(id)?;
        self.updates
            .lock()
            .unwrap()
            .push((id.to_string(), req.clone()));
        Ok(())
    }

    async fn delete_blog(&self, id: &str) -> Result<(), ApiError> {
        self.record_call(format!("delete_blog {}", id));
        self.check_id(id)?;
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn request_publish(&self, id: &str) -> Result<(), ApiError> {
        self.record_call(format!("request_publish {}", id));
        self.check_id(id)
    }

    async fn stats(&self) -> Result<BlogStats, ApiError> {
        self.record_call("stats".into());
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn topic_ideas(&self, req: &TopicIdeasRequest) -> Result<Vec<String>, ApiError> {
        self.record_call(format!("topic_ideas {}", req.focus_or_niche));
        let mut options = self.options.lock().unwrap().clone();
        if let Some(count) = req.count {
            options.truncate(count);
        }
        Ok(options)
    }

    async fn generate_titles(&self, ctx: &GenerationContext) -> Result<Vec<String>, ApiError> {
        self.record_call("generate_titles".into());
        self.generated(ctx)?;
        Ok(self.options.lock().unwrap().clone())
    }

    async fn generate_intros(&self, ctx: &GenerationContext) -> Result<Vec<String>, ApiError> {
        self.record_call("generate_intros".into());
        self.generated(ctx)?;
        Ok(self.options.lock().unwrap().clone())
    }

    async fn generate_outlines(
        &self,
        ctx: &GenerationContext,
    ) -> Result<Vec<Vec<String>>, ApiError> {
        self.record_call("generate_outlines".into());
        self.generated(ctx)?;
        Ok(self.outlines.lock().unwrap().clone())
    }

    async fn generate_blog(&self, req: &GenerateBlogRequest) -> Result<FinalBlog, ApiError> {
        self.record_call("generate_blog".into());
        self.generate_requests.lock().unwrap().push(req.clone());
        Ok(self.final_blog.lock().unwrap().clone())
    }

    async fn generate_image(
        &self,
        req: &ImageGenerateRequest,
    ) -> Result<GeneratedImage, ApiError> {
        self.record_call("generate_image".into());
        self.image_requests.lock().unwrap().push(req.clone());
        Ok(GeneratedImage {
            image_url: "/media/generated.png".into(),
            meta: serde_json::json!({"prompt": req.prompt}),
        })
    }

    async fn list_images(&self, limit: u32, source: Option<&str>) -> Result<ImagePage, ApiError> {
        self.record_call(format!("list_images {} {}", limit, source.unwrap_or("all")));
        let items: Vec<GalleryImage> = self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|img| source.is_none() || img.source.as_deref() == source)
            .take(limit as usize)
            .cloned()
            .collect();
        let total = items.len() as u64;
        Ok(ImagePage {
            items,
            total: Some(total),
        })
    }

    async fn save_image(&self, req: &ImageSaveRequest) -> Result<(), ApiError> {
        self.record_call("save_image".into());
        self.saved_images.lock().unwrap().push(req.clone());
        Ok(())
    }

    async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ApiError> {
        self.record_call(format!("upload_image {}", file_name));
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.len()));
        Ok(format!("/media/uploads/{}", file_name))
    }
}
