/// The profile of the token's user and the objects hanging off it
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::info;

use crate::base::{json_accessors, Property, PropertyTable, Resource, ResourceId, ResourceKind, RootScope};
use crate::client::LinodeClient;
use crate::error::{Error, Result};

pub struct ProfileKind;

impl ResourceKind for ProfileKind {
    const NAME: &'static str = "Profile";
    const API_ENDPOINT: &'static str = "/profile";
    const ID_ATTRIBUTE: &'static str = "username";
    const PROPERTIES: PropertyTable = &[
        ("username", Property::new().identifier()),
        ("uid", Property::new()),
        ("email", Property::new().mutable()),
        ("timezone", Property::new().mutable()),
        ("email_notifications", Property::new().mutable()),
        ("referrals", Property::new()),
        ("ip_whitelist_enabled", Property::new().mutable()),
        ("lish_auth_method", Property::new().mutable()),
        ("authorized_keys", Property::new()),
        ("two_factor_auth", Property::new()),
        ("restricted", Property::new()),
        ("authentication_type", Property::new()),
        ("verified_phone_number", Property::new()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

/// The user the API token belongs to
///
/// There is exactly one profile per token, so the endpoint carries no
/// identifier. Use [`Profile::fetch`] to get one with its username filled in.
pub type Profile = Resource<ProfileKind>;

impl Resource<ProfileKind> {
    json_accessors! {
        uid: u64;
        email: String;
        timezone: String;
        email_notifications: bool;
        /// Referral code, URL and counts
        referrals: Value;
        ip_whitelist_enabled: bool;
        /// `password_keys`, `keys_only` or `disabled`
        lish_auth_method: String;
        authorized_keys: Option<Vec<String>>;
        two_factor_auth: bool;
        restricted: bool;
        authentication_type: String;
        verified_phone_number: Option<String>;
    }

    /// GET `/profile` and build a populated profile from it
    pub async fn fetch(client: &LinodeClient) -> Result<Self> {
        let result = client.get(ProfileKind::API_ENDPOINT, None).await?;
        let username = ResourceId::from_json(&result["username"])
            .ok_or_else(|| Error::unexpected("profile response without 'username'", &result))?;
        Ok(Self::from_json(client.clone(), username, result))
    }

    pub fn username(&self) -> &ResourceId {
        self.id()
    }

    pub fn set_email(&mut self, email: impl Into<String>) -> Result<()> {
        self.set("email", email.into())
    }

    pub fn set_timezone(&mut self, timezone: impl Into<String>) -> Result<()> {
        self.set("timezone", timezone.into())
    }

    pub fn set_email_notifications(&mut self, enabled: bool) -> Result<()> {
        self.set("email_notifications", enabled)
    }

    pub fn set_ip_whitelist_enabled(&mut self, enabled: bool) -> Result<()> {
        self.set("ip_whitelist_enabled", enabled)
    }

    pub fn set_lish_auth_method(&mut self, method: impl Into<String>) -> Result<()> {
        self.set("lish_auth_method", method.into())
    }

    /// Start enabling two factor auth; returns the secret to confirm with
    pub async fn enable_tfa(&self) -> Result<String> {
        let result = self.client().post("/profile/tfa-enable", None, None).await?;
        result
            .get("secret")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::unexpected("tfa-enable response without 'secret'", &result))
    }

    /// Finish enabling two factor auth with a code generated from the secret
    pub async fn confirm_tfa(&self, code: &str) -> Result<()> {
        let body = json!({ "tfa_code": code });
        self.client()
            .post("/profile/tfa-enable-confirm", None, Some(&body))
            .await?;
        info!("Two factor auth confirmed for {}", self.id());
        Ok(())
    }

    pub async fn disable_tfa(&self) -> Result<()> {
        self.client().post("/profile/tfa-disable", None, None).await?;
        info!("Two factor auth disabled for {}", self.id());
        Ok(())
    }

    /// Grants of a restricted user as raw JSON; `None` for unrestricted users
    pub async fn grants(&self) -> Result<Option<Value>> {
        let result = self.client().get("/profile/grants", None).await?;
        Ok(match result {
            Value::Null => None,
            grants => Some(grants),
        })
    }

    /// Entries of the IP whitelist, if the whitelist is enabled
    pub async fn whitelist(&self) -> Result<Vec<WhitelistEntry>> {
        WhitelistEntry::list(self.client()).await
    }

    pub async fn add_whitelist_entry(
        &self,
        address: &str,
        netmask: &str,
        note: Option<&str>,
    ) -> Result<WhitelistEntry> {
        let body = json!({
            "address": address,
            "netmask": netmask,
            "note": note,
        });
        let result = self.client().post("/profile/whitelist", None, Some(&body)).await?;

        let id = result
            .get("id")
            .and_then(ResourceId::from_json)
            .ok_or_else(|| Error::unexpected("Unexpected response creating whitelist entry!", &result))?;

        info!("Whitelisted {}/{}", address, netmask);
        Ok(WhitelistEntry::from_json(self.client().clone(), id, result))
    }

    /// Public keys uploaded to this profile
    pub async fn ssh_keys(&self) -> Result<Vec<SshKey>> {
        SshKey::list(self.client()).await
    }

    /// Upload an OpenSSH public key
    pub async fn ssh_key_upload(&self, label: &str, public_key: &str) -> Result<SshKey> {
        let body = json!({
            "label": label,
            "ssh_key": public_key.trim(),
        });
        let result = self.client().post("/profile/sshkeys", None, Some(&body)).await?;

        let id = result
            .get("id")
            .and_then(ResourceId::from_json)
            .ok_or_else(|| Error::unexpected("Unexpected response uploading SSH key!", &result))?;

        info!("Uploaded SSH key '{}' ({})", label, id);
        Ok(SshKey::from_json(self.client().clone(), id, result))
    }
}

pub struct AuthorizedAppKind;

impl ResourceKind for AuthorizedAppKind {
    const NAME: &'static str = "AuthorizedApp";
    const API_ENDPOINT: &'static str = "/profile/apps/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("scopes", Property::new()),
        ("label", Property::new()),
        ("created", Property::new().datetime()),
        ("expiry", Property::new().datetime()),
        ("thumbnail_url", Property::new()),
        ("website", Property::new()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

/// An OAuth app the user has granted access to
pub type AuthorizedApp = Resource<AuthorizedAppKind>;

impl Resource<AuthorizedAppKind> {
    json_accessors! {
        scopes: String;
        label: String;
        thumbnail_url: Option<String>;
        website: Option<String>;
    }

    pub async fn created(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("created").await
    }

    pub async fn expiry(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("expiry").await
    }
}

pub struct PersonalAccessTokenKind;

impl ResourceKind for PersonalAccessTokenKind {
    const NAME: &'static str = "PersonalAccessToken";
    const API_ENDPOINT: &'static str = "/profile/tokens/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("scopes", Property::new()),
        ("label", Property::new().mutable()),
        ("created", Property::new().datetime()),
        ("token", Property::new()),
        ("expiry", Property::new().datetime()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

pub type PersonalAccessToken = Resource<PersonalAccessTokenKind>;

impl Resource<PersonalAccessTokenKind> {
    json_accessors! {
        scopes: String;
        label: String;
        /// Only the first characters; the full token is shown once at creation
        token: String;
    }

    pub async fn created(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("created").await
    }

    pub async fn expiry(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("expiry").await
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.set("label", label.into())
    }
}

pub struct WhitelistEntryKind;

impl ResourceKind for WhitelistEntryKind {
    const NAME: &'static str = "WhitelistEntry";
    const API_ENDPOINT: &'static str = "/profile/whitelist/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("address", Property::new()),
        ("netmask", Property::new()),
        ("note", Property::new()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

pub type WhitelistEntry = Resource<WhitelistEntryKind>;

impl Resource<WhitelistEntryKind> {
    json_accessors! {
        address: String;
        netmask: String;
        note: Option<String>;
    }
}

pub struct SshKeyKind;

impl ResourceKind for SshKeyKind {
    const NAME: &'static str = "SSHKey";
    const API_ENDPOINT: &'static str = "/profile/sshkeys/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("label", Property::new().mutable()),
        ("ssh_key", Property::new()),
        ("created", Property::new().datetime()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

/// A public key stored on the profile, usable for instance deployments
pub type SshKey = Resource<SshKeyKind>;

impl Resource<SshKeyKind> {
    json_accessors! {
        label: String;
        ssh_key: String;
    }

    pub async fn created(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("created").await
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> Result<()> {
        self.set("label", label.into())
    }
}

pub struct TrustedDeviceKind;

impl ResourceKind for TrustedDeviceKind {
    const NAME: &'static str = "TrustedDevice";
    const API_ENDPOINT: &'static str = "/profile/devices/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("created", Property::new().datetime()),
        ("expiry", Property::new().datetime()),
        ("last_authenticated", Property::new().datetime()),
        ("last_remote_addr", Property::new()),
        ("user_agent", Property::new()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

pub type TrustedDevice = Resource<TrustedDeviceKind>;

impl Resource<TrustedDeviceKind> {
    json_accessors! {
        last_remote_addr: String;
        user_agent: String;
    }

    pub async fn created(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("created").await
    }

    pub async fn expiry(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("expiry").await
    }

    pub async fn last_authenticated(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("last_authenticated").await
    }
}

pub struct ProfileLoginKind;

impl ResourceKind for ProfileLoginKind {
    const NAME: &'static str = "ProfileLogin";
    const API_ENDPOINT: &'static str = "/profile/logins/{id}";
    const PROPERTIES: PropertyTable = &[
        ("id", Property::new().identifier()),
        ("datetime", Property::new().datetime()),
        ("ip", Property::new()),
        ("restricted", Property::new()),
        ("status", Property::new()),
        ("username", Property::new()),
    ];
    type Scope = RootScope;
    type Cache = ();
}

/// One login attempt on the profile
pub type ProfileLogin = Resource<ProfileLoginKind>;

impl Resource<ProfileLoginKind> {
    json_accessors! {
        ip: String;
        restricted: bool;
        /// `successful` or `failed`
        status: String;
        username: String;
    }

    pub async fn login_time(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.datetime("datetime").await
    }
}
