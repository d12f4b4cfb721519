/*
 * SPDX-FileCopyrightText: Copyright (c) 2022 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a
 * copy of this software and associated documentation files (the "Software"),
 * to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense,
 * and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
 * THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
 * FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
 * DEALINGS IN THE SOFTWARE.
 */

//! The HTTPS certificate: generating a signing request (or a self-signed
//! certificate) and uploading a signed certificate.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serde_with::serde_as;

use super::{check_transfer, read_required, to_body, CERTIFICATE_SERVICE};
use crate::model::{Flag, TransferProtocol};
use crate::reconcile::Resource;
use crate::{jsonmap, Controller, ImcError, ManagedObject, ValidationError};

const UPLOAD_STATUS: &str = "/Oem/Cisco/UploadStatus";
const LAST_CSR: &str = "/Oem/Cisco/LastCSR";

// ISO 3166-1 alpha-2
const COUNTRY_CODES: &str = "AD AE AF AG AI AL AM AO AQ AR AS AT AU AW AX AZ BA BB BD BE BF BG BH BI \
    BJ BL BM BN BO BQ BR BS BT BV BW BY BZ CA CC CD CF CG CH CI CK CL CM CN CO CR CU CV CW CX CY CZ \
    DE DJ DK DM DO DZ EC EE EG EH ER ES ET FI FJ FK FM FO FR GA GB GD GE GF GG GH GI GL GM GN GP GQ \
    GR GS GT GU GW GY HK HM HN HR HT HU ID IE IL IM IN IO IQ IR IS IT JE JM JO JP KE KG KH KI KM KN \
    KP KR KW KY KZ LA LB LC LI LK LR LS LT LU LV LY MA MC MD ME MF MG MH MK ML MM MN MO MP MQ MR MS \
    MT MU MV MW MX MY MZ NA NC NE NF NG NI NL NO NP NR NU NZ OM PA PE PF PG PH PK PL PM PN PR PS PT \
    PW PY QA RE RO RS RU RW SA SB SC SD SE SG SH SI SJ SK SL SM SN SO SR SS ST SV SX SY SZ TC TD TF \
    TG TH TJ TK TL TM TN TO TR TT TV TW TZ UA UG UM US UY UZ VA VC VE VG VI VN VU WF WS YE YT ZA ZM ZW";

fn certificates_path(ctl: &dyn Controller) -> String {
    format!("Managers/{}/NetworkProtocol/HTTPS/Certificates", ctl.manager_id())
}

#[derive(Debug)]
pub struct CertificateState {
    certificate: Option<ManagedObject>,
    service: ManagedObject,
}

/// Subject of the HTTPS certificate. The CSR can optionally be copied to a
/// remote server, or the controller can sign it itself.
#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertificateRequest {
    pub name: String,
    pub org: String,
    pub locality: String,
    pub state: String,
    pub country: String,
    pub org_unit: Option<String>,
    pub email: Option<String>,
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub file_name: Option<String>,
    pub protocol: Option<TransferProtocol>,
    #[serde_as(as = "Flag")]
    #[serde(default)]
    pub self_signed: bool,
}

impl CertificateRequest {
    fn subject(&self) -> Value {
        jsonmap::without_nulls(json!({
            "CommonName": self.name,
            "Organization": self.org,
            "OrganizationalUnit": self.org_unit,
            "City": self.locality,
            "State": self.state,
            "Country": self.country,
            "Email": self.email,
        }))
    }

    fn body(&self, ctl: &dyn Controller) -> Value {
        let mut body = self.subject();
        let extra = jsonmap::without_nulls(json!({
            "CertificateCollection": {
                "@odata.id": format!("/redfish/v1/{}", certificates_path(ctl))
            },
            "Oem": { "Cisco": {
                "SelfSigned": self.self_signed,
                "RemoteServer": self.server,
                "User": self.username,
                "Password": self.password,
                "RemoteFile": self.file_name,
                "Protocol": self.protocol,
            } }
        }));
        jsonmap::merge(&mut body, &extra);
        body
    }
}

impl Resource for CertificateRequest {
    const KIND: &'static str = "certificate_request";
    type State = CertificateState;

    fn validate(&mut self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("name", &self.name),
            ("org", &self.org),
            ("locality", &self.locality),
            ("state", &self.state),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::Missing(field));
            }
            if value.len() > 64 {
                return Err(ValidationError::invalid(field, "at most 64 characters"));
            }
        }
        self.country = self.country.to_ascii_uppercase();
        if self.country.len() != 2 || !COUNTRY_CODES.split_whitespace().any(|c| c == self.country) {
            return Err(ValidationError::invalid("country", "an ISO 3166 two-letter country code"));
        }
        if self.server.is_some() {
            if self.file_name.is_none() {
                return Err(ValidationError::Missing("file_name"));
            }
            if self.protocol.is_none() {
                return Err(ValidationError::Missing("protocol"));
            }
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<CertificateState, ImcError> {
        let certificate = match ctl.get_members(&certificates_path(ctl)) {
            Ok(members) => match members.first() {
                Some(path) => ctl.get_resource(path)?,
                None => None,
            },
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        Ok(CertificateState {
            certificate,
            service: read_required(ctl, CERTIFICATE_SERVICE)?,
        })
    }

    fn matches(&self, current: &CertificateState) -> bool {
        let subject = self.subject();
        let issued = current
            .certificate
            .as_ref()
            .and_then(|c| c.pointer("/Subject"))
            .is_some_and(|s| jsonmap::is_subset(&subject, s));
        let requested = !self.self_signed
            && current
                .service
                .pointer(LAST_CSR)
                .is_some_and(|s| jsonmap::is_subset(&subject, s));
        issued || requested
    }

    fn write(&self, ctl: &dyn Controller, _current: &CertificateState) -> Result<(), ImcError> {
        let action = format!("{CERTIFICATE_SERVICE}/Actions/CertificateService.GenerateCSR");
        ctl.post_action(&action, self.body(ctl))?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct UploadRequest<'a> {
    remote_server: &'a str,
    user: &'a str,
    password: &'a str,
    remote_file: &'a str,
    protocol: TransferProtocol,
}

/// Installs a signed certificate pulled from a remote server.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertificateUpload {
    pub server: String,
    pub username: String,
    pub password: String,
    pub file_name: String,
    pub protocol: TransferProtocol,
}

impl Resource for CertificateUpload {
    const KIND: &'static str = "certificate_upload";
    type State = ManagedObject;

    fn validate(&mut self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("server", &self.server),
            ("username", &self.username),
            ("file_name", &self.file_name),
        ] {
            if value.is_empty() {
                return Err(ValidationError::Missing(field));
            }
        }
        if self.protocol == TransferProtocol::None {
            return Err(ValidationError::invalid("protocol", "a transfer protocol is required"));
        }
        Ok(())
    }

    fn read(&self, ctl: &dyn Controller) -> Result<ManagedObject, ImcError> {
        read_required(ctl, CERTIFICATE_SERVICE)
    }

    fn matches(&self, current: &ManagedObject) -> bool {
        super::transfer_done(
            current.pointer(UPLOAD_STATUS),
            &self.server,
            &self.file_name,
            &self.protocol.to_string(),
        )
    }

    fn write(&self, ctl: &dyn Controller, current: &ManagedObject) -> Result<(), ImcError> {
        let action = format!("{}/Actions/Oem/CiscoCertificateService.Upload", current.path);
        let request = UploadRequest {
            remote_server: &self.server,
            user: &self.username,
            password: &self.password,
            remote_file: &self.file_name,
            protocol: self.protocol,
        };
        ctl.post_action(&action, to_body(&action, &request)?)?;
        check_transfer(ctl, &current.path, UPLOAD_STATUS, "certificate upload")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::kinds::testing::{assert_converges, run};
    use crate::memory::{MemoryController, FIXTURE_MANAGER_ID};

    fn request() -> serde_json::Value {
        json!({
            "name": "imc01.example.com",
            "org": "Example",
            "locality": "San Jose",
            "state": "California",
            "country": "us",
            "org_unit": "Lab"
        })
    }

    #[test]
    fn test_csr_is_generated_once() {
        let imc = MemoryController::new();
        assert_converges(&imc, "certificate_request", request());
        let svc = imc.object("CertificateService").unwrap();
        assert_eq!(svc["Oem"]["Cisco"]["LastCSR"]["Country"], "US");
        let (path, body) = imc.actions().remove(0);
        assert_eq!(path, "CertificateService/Actions/CertificateService.GenerateCSR");
        assert_eq!(body["Oem"]["Cisco"]["SelfSigned"], false);
    }

    #[test]
    fn test_self_signed_replaces_the_certificate() {
        let imc = MemoryController::new();
        let mut params = request();
        params["self_signed"] = json!("yes");
        assert_converges(&imc, "certificate_request", params);
        let cert = imc
            .object(&format!("Managers/{FIXTURE_MANAGER_ID}/NetworkProtocol/HTTPS/Certificates/1"))
            .unwrap();
        assert_eq!(cert["Subject"]["CommonName"], "imc01.example.com");
        assert_eq!(cert["Subject"]["OrganizationalUnit"], "Lab");
    }

    #[test]
    fn test_bad_country() {
        let imc = MemoryController::new();
        let mut params = request();
        params["country"] = json!("XX");
        assert!(run(&imc, "certificate_request", params, false).failed);
        let mut params = request();
        params["server"] = json!("10.0.0.9");
        let r = run(&imc, "certificate_request", params, false);
        assert_eq!(r.msg.as_deref(), Some("missing required parameter file_name"));
    }

    #[test]
    fn test_upload() {
        let imc = MemoryController::new();
        let upload = json!({
            "server": "10.0.0.9",
            "username": "deploy",
            "password": "secret",
            "file_name": "/certs/imc01.pem",
            "protocol": "sftp"
        });
        assert_converges(&imc, "certificate_upload", upload);
        let (path, _) = imc.actions().remove(0);
        assert_eq!(path, "CertificateService/Actions/Oem/CiscoCertificateService.Upload");
    }
}
