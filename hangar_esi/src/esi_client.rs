use std::collections::HashMap;

use async_trait::async_trait;
use hangar_core::{CharacterId, CorporationId, RawAsset, TypeId};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::{
    EsiError, EsiResult,
    api::{CharacterPublicInfo, CorporationPublicInfo, EsiApiClient, EsiAsset, UniverseName},
    auth::EphemeralCredential,
    config::EsiConfig,
};

const NAMES_BATCH_SIZE: usize = 1000;
const INVENTORY_TYPE_CATEGORY: &str = "inventory_type";

/// Plain HTTP access to ESI. Holds no credentials of its own; authenticated
/// calls take the bearer token from the `EphemeralCredential` they are given.
#[derive(Clone)]
pub struct ReqwestEsiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestEsiClient {
    pub fn new(config: &EsiConfig) -> EsiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.esi_base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> EsiResult<Response> {
        let response = request.send().await?;
        check_status(endpoint, response.status().as_u16())?;
        Ok(response)
    }

    async fn get_public<T: DeserializeOwned>(&self, path: &str) -> EsiResult<T> {
        let response = self.send(path, self.http.get(self.url(path))).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl EsiApiClient for ReqwestEsiClient {
    async fn character_corporation(&self, character_id: CharacterId) -> EsiResult<CorporationId> {
        let info: CharacterPublicInfo = self
            .get_public(&format!("/characters/{character_id}/"))
            .await?;
        Ok(CorporationId(info.corporation_id))
    }

    async fn corporation_name(&self, corporation_id: CorporationId) -> EsiResult<String> {
        let info: CorporationPublicInfo = self
            .get_public(&format!("/corporations/{corporation_id}/"))
            .await?;
        Ok(info.name)
    }

    async fn assets(&self, credential: &EphemeralCredential) -> EsiResult<Vec<RawAsset>> {
        let path = credential.assets_path();
        let mut assets = Vec::new();
        let mut page = 1_u32;
        let mut pages = 1_u32;

        while page <= pages {
            let request = self
                .http
                .get(self.url(&path))
                .bearer_auth(credential.access_token())
                .query(&[("page", page)]);
            let response = self.send(&path, request).await?;
            pages = page_count(&response);

            let batch: Vec<EsiAsset> = response.json().await?;
            assets.extend(batch.into_iter().map(RawAsset::from));
            page += 1;
        }

        log::debug!(
            "fetched {} assets from {path} across {pages} page(s)",
            assets.len()
        );
        Ok(assets)
    }

    async fn type_names(&self, type_ids: &[TypeId]) -> EsiResult<HashMap<TypeId, String>> {
        const PATH: &str = "/universe/names/";
        let mut names = HashMap::with_capacity(type_ids.len());

        for chunk in type_ids.chunks(NAMES_BATCH_SIZE) {
            let ids: Vec<i32> = chunk.iter().map(|type_id| type_id.0).collect();
            let response = self
                .send(PATH, self.http.post(self.url(PATH)).json(&ids))
                .await?;
            let batch: Vec<UniverseName> = response.json().await?;
            names.extend(
                batch
                    .into_iter()
                    .filter(|entry| entry.category == INVENTORY_TYPE_CATEGORY)
                    .filter_map(|entry| {
                        i32::try_from(entry.id)
                            .ok()
                            .map(|id| (TypeId(id), entry.name))
                    }),
            );
        }

        Ok(names)
    }
}

/// 401 and 403 mean the credential itself was refused; everything else that
/// is not a success is an ordinary failure.
pub(crate) fn check_status(endpoint: &str, status: u16) -> EsiResult<()> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(EsiError::CredentialRejected {
            endpoint: endpoint.to_owned(),
            status,
        }),
        _ => Err(EsiError::UnexpectedStatus {
            endpoint: endpoint.to_owned(),
            status,
        }),
    }
}

fn page_count(response: &Response) -> u32 {
    parse_page_count(
        response
            .headers()
            .get("x-pages")
            .and_then(|value| value.to_str().ok()),
    )
}

fn parse_page_count(header: Option<&str>) -> u32 {
    header
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(1)
        .max(1)
}
