use crate::core::client::AuthClient;
use crate::domain::model::ApiRequest;
use crate::domain::ports::Transport;
use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use url::form_urlencoded;

/// 後台管理的 REST 資源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Yachts,
    Bookings,
    Packages,
    Customers,
    Regions,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Yachts,
        Resource::Bookings,
        Resource::Packages,
        Resource::Customers,
        Resource::Regions,
    ];

    pub fn collection_path(self) -> &'static str {
        match self {
            Resource::Yachts => "/yachts",
            Resource::Bookings => "/bookings",
            Resource::Packages => "/packages",
            Resource::Customers => "/customers",
            Resource::Regions => "/regions",
        }
    }

    /// id 編碼為單一路徑片段；`/`、`?`、`#` 不會改變路由
    pub fn item_path(self, id: impl fmt::Display) -> String {
        format!("{}/{}", self.collection_path(), encode_path_segment(&id.to_string()))
    }
}

// form_urlencoded 把空白編成 `+`；路徑中改用 `%20`（原本的 `+` 已被編成 `%2B`）
fn encode_path_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_path().trim_start_matches('/'))
    }
}

/// 以 JSON 讀寫資源的薄封裝；每個呼叫都經過 `AuthClient`
pub struct ResourceClient<T: Transport> {
    client: AuthClient<T>,
}

impl<T: Transport> ResourceClient<T> {
    pub fn new(client: AuthClient<T>) -> Self {
        Self { client }
    }

    pub fn auth_client(&self) -> &AuthClient<T> {
        &self.client
    }

    pub async fn list<R>(&self, resource: Resource, page: Option<u32>) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let mut request = ApiRequest::get(resource.collection_path());
        if let Some(page) = page {
            request = request.with_query("page", page.to_string());
        }

        self.client.execute(request).await?.json()
    }

    pub async fn get<R>(&self, resource: Resource, id: impl fmt::Display) -> Result<R>
    where
        R: DeserializeOwned,
    {
        self.client
            .execute(ApiRequest::get(resource.item_path(id)))
            .await?
            .json()
    }

    pub async fn create<B, R>(&self, resource: Resource, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = ApiRequest::post(resource.collection_path()).with_json(body)?;
        self.client.execute(request).await?.json()
    }

    pub async fn update<B, R>(
        &self,
        resource: Resource,
        id: impl fmt::Display,
        body: &B,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = ApiRequest::put(resource.item_path(id)).with_json(body)?;
        self.client.execute(request).await?.json()
    }

    pub async fn delete(&self, resource: Resource, id: impl fmt::Display) -> Result<()> {
        self.client
            .execute(ApiRequest::delete(resource.item_path(id)))
            .await?;
        Ok(())
    }
}
