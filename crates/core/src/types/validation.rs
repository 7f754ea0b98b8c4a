//! Form validation for sign-in, registration, profile and product editing.
//!
//! Validation happens before any request is sent. A form that fails
//! validation produces [`ValidationErrors`], a map from field name to a
//! human-readable message.

use core::fmt;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::{CategoryPath, MainFlag, ProductAttribute, SizeVariant, normalize_main_image};
use super::user::ProfileUpdate;

// =============================================================================
// Field Errors
// =============================================================================

/// Per-field validation failures.
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("invalid input: {}", format_fields(.fields))]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

fn format_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// Record a failure for `field`. The first message per field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_insert_with(|| message.into());
    }

    /// Message for a single field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(f, m)| (f.as_str(), m.as_str()))
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

// =============================================================================
// Email
// =============================================================================

/// Errors that can occur when parsing an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The input string is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input does not contain exactly one @ symbol.
    #[error("email must contain exactly one @ symbol")]
    AtSymbol,
    /// The local part (before @) is empty.
    #[error("email local part cannot be empty")]
    EmptyLocalPart,
    /// The domain part (after @) has no dot or is empty.
    #[error("email domain is invalid")]
    InvalidDomain,
}

/// A syntactically valid email address.
///
/// ## Constraints
///
/// - Length: 1-254 characters (RFC 5321 limit)
/// - Exactly one @ symbol with a non-empty local part
/// - Domain contains a dot that is neither first nor last
///
/// ## Examples
///
/// ```
/// use storefront_sync_core::Email;
///
/// assert!(Email::parse("user@example.com").is_ok());
/// assert!(Email::parse("user.name+tag@domain.co.uk").is_ok());
///
/// assert!(Email::parse("").is_err());
/// assert!(Email::parse("no-at-symbol").is_err());
/// assert!(Email::parse("user@localhost").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Maximum length of an email address (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Parse an `Email`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an [`EmailError`] describing the first rule the input breaks.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::AtSymbol)?;
        if domain.contains('@') {
            return Err(EmailError::AtSymbol);
        }
        if local.is_empty() {
            return Err(EmailError::EmptyLocalPart);
        }
        let dotted = domain
            .find('.')
            .is_some_and(|dot| dot > 0 && !domain.ends_with('.'));
        if !dotted {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the email address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the domain part of the email (after the @).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Password Policy
// =============================================================================

/// Minimum password length in characters.
pub const PASSWORD_MIN_LENGTH: usize = 8;
/// Maximum password length in characters.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Check a new password against the policy.
///
/// # Errors
///
/// Returns a message describing the first rule the password breaks.
pub fn check_password(password: &str) -> Result<(), &'static str> {
    let length = password.chars().count();
    if length < PASSWORD_MIN_LENGTH {
        return Err("password must be at least 8 characters");
    }
    if length > PASSWORD_MAX_LENGTH {
        return Err("password must be at most 128 characters");
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err("password must contain a letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("password must contain a digit");
    }
    Ok(())
}

// =============================================================================
// Forms
// =============================================================================

/// Sign-in form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl LoginForm {
    /// Create a sign-in form.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Check that both fields are usable.
    ///
    /// Sign-in does not enforce the password policy; the server decides.
    ///
    /// # Errors
    ///
    /// Returns the failing fields.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Err(e) = Email::parse(&self.email) {
            errors.add("email", e.to_string());
        }
        if self.password.is_empty() {
            errors.add("password", "password is required");
        }
        errors.into_result()
    }
}

/// Registration form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for RegisterForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterForm")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

impl RegisterForm {
    /// Check every field, collecting all failures.
    ///
    /// # Errors
    ///
    /// Returns the failing fields.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if let Err(e) = Email::parse(&self.email) {
            errors.add("email", e.to_string());
        }
        if let Err(message) = check_password(&self.password) {
            errors.add("password", message);
        }
        if self.password != self.confirm_password {
            errors.add("confirmPassword", "passwords do not match");
        }
        if self.first_name.trim().is_empty() {
            errors.add("firstName", "first name is required");
        }
        if self.last_name.trim().is_empty() {
            errors.add("lastName", "last name is required");
        }
        errors.into_result()
    }
}

impl ProfileUpdate {
    /// Check names and phone number.
    ///
    /// # Errors
    ///
    /// Returns the failing fields.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.first_name.trim().is_empty() {
            errors.add("firstName", "first name is required");
        }
        if self.last_name.trim().is_empty() {
            errors.add("lastName", "last name is required");
        }
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            let allowed = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
            if !allowed || !(7..=15).contains(&digits) {
                errors.add("phone", "phone number is invalid");
            }
        }
        errors.into_result()
    }
}

// =============================================================================
// Product Editor
// =============================================================================

/// An image file selected in the product editor.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// Original file name.
    pub file_name: String,
    /// MIME type (e.g., `image/jpeg`).
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Whether this image is the cover.
    pub is_main: bool,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .field("is_main", &self.is_main)
            .finish()
    }
}

impl MainFlag for ImageUpload {
    fn is_main(&self) -> bool {
        self.is_main
    }

    fn set_main(&mut self, is_main: bool) {
        self.is_main = is_main;
    }
}

/// A color variant being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorDraft {
    pub color: String,
    pub color_code: Option<String>,
    pub sizes: Vec<SizeVariant>,
    pub images: Vec<ImageUpload>,
}

/// The product editor's form state.
///
/// `id` is `None` when creating and `Some` when editing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDraft {
    pub id: Option<ProductId>,
    pub name: String,
    pub slug: String,
    pub brand: String,
    pub description: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub category_path: CategoryPath,
    pub colors: Vec<ColorDraft>,
    pub images: Vec<ImageUpload>,
    pub attributes: Vec<ProductAttribute>,
    pub is_new: bool,
    pub is_trending: bool,
}

impl ProductDraft {
    /// Derive a URL slug from a product name.
    #[must_use]
    pub fn slugify(name: &str) -> String {
        let mut slug = String::with_capacity(name.len());
        for c in name.trim().chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        slug
    }

    /// Enforce exactly one main image at product level and per color.
    pub fn normalize_images(&mut self) {
        normalize_main_image(&mut self.images);
        for color in &mut self.colors {
            normalize_main_image(&mut color.images);
        }
    }

    /// Check the draft before submission.
    ///
    /// # Errors
    ///
    /// Returns the failing fields. Color fields are keyed `colors[i].field`.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.name.trim().is_empty() {
            errors.add("name", "name is required");
        }
        if self.slug.is_empty() {
            errors.add("slug", "slug is required");
        } else if self.slug != Self::slugify(&self.slug) {
            errors.add("slug", "slug may only contain lowercase letters, digits and dashes");
        }
        if self.brand.trim().is_empty() {
            errors.add("brand", "brand is required");
        }
        if self.category_path.category.trim().is_empty() {
            errors.add("categoryPath.category", "category is required");
        }
        if self.price <= Decimal::ZERO {
            errors.add("price", "price must be greater than zero");
        }
        if let Some(sale) = self.sale_price
            && (sale <= Decimal::ZERO || sale >= self.price)
        {
            errors.add("salePrice", "sale price must be between zero and the price");
        }
        if self.colors.is_empty() {
            errors.add("colors", "at least one color is required");
        }
        for (index, color) in self.colors.iter().enumerate() {
            if color.color.trim().is_empty() {
                errors.add(format!("colors[{index}].color"), "color name is required");
            }
            if color.sizes.is_empty() {
                errors.add(format!("colors[{index}].sizes"), "at least one size is required");
            }
        }
        errors.into_result()
    }
}
