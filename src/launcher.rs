use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::to_value;

use crate::api::ApiClient;
use crate::logging::log_launch;
use crate::notify::Notification;

/// Configuration for one launchable bot: endpoint, vendor choices with
/// their per-vendor defaults, and canned instruction prompts. Data only,
/// like the dashboard view config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LauncherSpec {
    pub id: String,
    pub label: String,
    pub endpoint: String,
    #[serde(default = "default_true")]
    pub allow_rent_line: bool,
    pub vendors: Vec<VendorOption>,
    #[serde(default)]
    pub instructions: Vec<InstructionOption>,
    pub defaults: LaunchDefaults,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorOption {
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub default_attach_only: bool,
    #[serde(default)]
    pub default_rent_line_enabled: bool,
    #[serde(default)]
    pub default_instruction_id: Option<String>,
    #[serde(default)]
    pub default_apo_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionOption {
    pub id: String,
    pub label: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchDefaults {
    #[serde(default)]
    pub rent_line: Option<String>,
    #[serde(default)]
    pub attach_only: bool,
    #[serde(default = "default_true")]
    pub test_mode: bool,
}

impl LauncherSpec {
    /// Built-in voucher-entry launcher.
    pub fn voucher_entry() -> Self {
        let vendor = |value: &str,
                      label: &str,
                      attach_only: bool,
                      rent_line: bool,
                      instruction: &str,
                      apo: Option<&str>| VendorOption {
            value: value.to_string(),
            label: label.to_string(),
            default_attach_only: attach_only,
            default_rent_line_enabled: rent_line,
            default_instruction_id: Some(instruction.to_string()),
            default_apo_override: apo.map(|s| s.to_string()),
        };
        Self {
            id: "voucher-entry".to_string(),
            label: "Voucher Entry Bot".to_string(),
            endpoint: "/bots/voucher-entry".to_string(),
            allow_rent_line: true,
            vendors: vec![
                vendor("cdw", "CDW", true, false, "cdw", None),
                vendor("royal", "Royal Industrial", false, false, "none", Some("KERNH-APO950043J")),
                vendor("class", "Class Leasing", false, true, "class", None),
                vendor("mobile", "Mobile Modular", false, true, "mobile", None),
                vendor("floyds", "Floyd's", false, false, "none", Some("KERNH-APO962523J")),
            ],
            instructions: vec![
                InstructionOption {
                    id: "none".to_string(),
                    label: "None".to_string(),
                    prompt: String::new(),
                },
                InstructionOption {
                    id: "cdw".to_string(),
                    label: "CDW Prompt".to_string(),
                    prompt: "INVOICE NUMBER RULES (CDW):\n\
                             - The invoice number is ALPHANUMERIC (contains at least one letter and one digit).\n\
                             - Typical length 6 characters, uppercase, no spaces. Examples: AF66R7Y, AB123C45."
                        .to_string(),
                },
                InstructionOption {
                    id: "class".to_string(),
                    label: "Class Leasing Prompt".to_string(),
                    prompt: "PO NUMBER RULES (Class Leasing):\n\
                             - The PO number will often have the form of LN1234 or KERNH-LN5678\n\
                             - Typically the Lease# XXXX will match the PO as LNXXXX.  Don't include trailing zero like _0"
                        .to_string(),
                },
                InstructionOption {
                    id: "mobile".to_string(),
                    label: "Mobile Modular Prompt".to_string(),
                    prompt: "PO NUMBER RULES (Mobile Modular):\n\
                             - The PO number will often have the form of KERNH-CON12345"
                        .to_string(),
                },
            ],
            defaults: LaunchDefaults {
                rent_line: Some("FY26".to_string()),
                attach_only: false,
                test_mode: true,
            },
        }
    }

    pub fn vendor(&self, key: &str) -> Option<&VendorOption> {
        self.vendors.iter().find(|v| v.value == key)
    }

    pub fn instruction(&self, id: &str) -> Option<&InstructionOption> {
        self.instructions.iter().find(|i| i.id == id)
    }
}

/// Wire body for the launch endpoint; optional knobs are elided entirely
/// rather than sent as null.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchRequest {
    pub vendor_key: String,
    pub test_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_line: Option<String>,
    pub attach_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apo_override: Option<String>,
}

/// Form state for one launch, seeded from launcher and vendor defaults.
#[derive(Debug, Clone)]
pub struct LaunchForm {
    pub vendor_key: String,
    pub test_mode: bool,
    pub attach_only: bool,
    pub rent_line_enabled: bool,
    pub rent_line: String,
    pub instructions: String,
    pub apo_override: Option<String>,
}

impl LaunchForm {
    pub fn for_vendor(spec: &LauncherSpec, vendor_key: &str) -> Result<Self> {
        let vendor = spec
            .vendor(vendor_key)
            .ok_or_else(|| anyhow!("unknown vendor `{}`", vendor_key))?;
        let rent_line_enabled = spec.allow_rent_line && vendor.default_rent_line_enabled;
        let instructions = vendor
            .default_instruction_id
            .as_deref()
            .and_then(|id| spec.instruction(id))
            .map(|i| i.prompt.clone())
            .unwrap_or_default();
        Ok(Self {
            vendor_key: vendor.value.clone(),
            test_mode: spec.defaults.test_mode,
            attach_only: vendor.default_attach_only || spec.defaults.attach_only,
            rent_line_enabled,
            rent_line: if rent_line_enabled {
                spec.defaults.rent_line.clone().unwrap_or_default()
            } else {
                String::new()
            },
            instructions,
            apo_override: vendor.default_apo_override.clone(),
        })
    }

    /// Assemble the wire body. Rent line only when enabled and non-empty;
    /// instructions only when non-blank.
    pub fn request(&self) -> LaunchRequest {
        LaunchRequest {
            vendor_key: self.vendor_key.clone(),
            test_mode: self.test_mode,
            rent_line: (self.rent_line_enabled && !self.rent_line.is_empty())
                .then(|| self.rent_line.clone()),
            attach_only: self.attach_only,
            additional_instructions: (!self.instructions.trim().is_empty())
                .then(|| self.instructions.clone()),
            apo_override: self.apo_override.clone(),
        }
    }
}

/// What a launch attempt produced.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub notification: Notification,
    pub run_key: Option<String>,
}

/// Post one launch. Missing vendor is a precondition failure surfaced as a
/// notification without touching the network; transport failures are
/// recovered here the same way.
pub async fn launch(api: &ApiClient, spec: &LauncherSpec, form: &LaunchForm) -> LaunchOutcome {
    if form.vendor_key.is_empty() {
        return LaunchOutcome {
            notification: Notification::error(
                "Select a vendor to start a run",
                "Pick one of the configured vendors first.",
            ),
            run_key: None,
        };
    }

    let request = form.request();
    let body = match to_value(&request) {
        Ok(body) => body,
        Err(err) => {
            return LaunchOutcome {
                notification: Notification::error("Unable to schedule run", err.to_string()),
                run_key: None,
            }
        }
    };

    match api.post(&spec.endpoint, &body).await {
        Ok(resp) => {
            let run_key = resp
                .get("runid")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            log_launch(&form.vendor_key, "scheduled", run_key.as_deref());
            let description = match &run_key {
                Some(key) => format!("Run {} queued successfully.", key),
                None => "The run was queued successfully.".to_string(),
            };
            LaunchOutcome {
                notification: Notification::success("Run scheduled").with_description(description),
                run_key,
            }
        }
        Err(err) => {
            log_launch(&form.vendor_key, "failed", None);
            let msg = err.to_string();
            let description = if msg.is_empty() {
                "Something went wrong while starting the run.".to_string()
            } else {
                msg
            };
            LaunchOutcome {
                notification: Notification::error("Unable to schedule run", description),
                run_key: None,
            }
        }
    }
}
