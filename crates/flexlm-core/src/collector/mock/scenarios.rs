//! Canned `lmutil lmstat -a` reports.
//!
//! Shaped after real FlexLM output, including the lines the parser is
//! expected to skip (banner, license file paths, quoted feature titles).

/// Healthy server, two daemons, two features, four checkouts.
pub const TYPICAL_REPORT: &str = "\
lmutil - Copyright (c) 1989-2022 Flexera. All Rights Reserved.
Flexible License Manager status on Wed 8/4/2025 14:30

License server status: 27000@localhost
    License file(s) on localhost: /opt/flexlm/licenses/sw_d.lic:

localhost: license server UP (MASTER) v11.18.1

Vendor daemon status (on localhost):

SolidWorksNetworkLicense: UP v11.18.1
SOLIDWORKS: UP v11.18.1

Feature usage info:

Users of SOLIDWORKS:  (Total of 10 licenses issued;  Total of 3 licenses in use)

  \"SOLIDWORKS\" v2023.0400, vendor: SolidWorksNetworkLicense
  floating license

    user1 WORKSTATION-01 WORKSTATION-01 (v2023.0400) (localhost/27000 1234), start Wed 8/4 14:25
    user2 WORKSTATION-02 WORKSTATION-02 (v2023.0400) (localhost/27000 1235), start Wed 8/4 14:20
    admin PC-ADMIN PC-ADMIN (v2023.0400) (localhost/27000 1236), start Wed 8/4 14:15

Users of COSMOSWORKS:  (Total of 5 licenses issued;  Total of 1 license in use)

  \"COSMOSWORKS\" v2023.0400, vendor: SolidWorksNetworkLicense
  floating license

    user1 WORKSTATION-01 WORKSTATION-01 (v2023.0400) (localhost/27000 1237), start Wed 8/4 14:26
";

/// `lmutil` could not reach the server.
pub const SERVER_DOWN_REPORT: &str = "\
lmutil - Copyright (c) 1989-2022 Flexera. All Rights Reserved.
Flexible License Manager status on Wed 8/4/2025 14:30

Error getting status: Cannot connect to license server system. (-15,10:10061 \"WinSock: Connection refused\")
";

/// Three features, one of them idle, with repeat users across features.
pub const LARGE_REPORT: &str = "\
lmutil - Copyright (c) 1989-2023 Flexera. All Rights Reserved.
Flexible License Manager status on Mon 3/2/2026 09:12

License server status: 25734@lic-eu.example.com
    License file(s) on lic-eu: /opt/flexlm/licenses/eu.lic:

lic-eu: license server UP (MASTER) v11.19.0

Vendor daemon status (on lic-eu):

SW_D: UP v11.19.0

Feature usage info:

Users of solidworks:  (Total of 15 licenses issued;  Total of 5 licenses in use)

  \"solidworks\" v2024.0500, vendor: SW_D, expiry: 31-dec-2026
  floating license

    jdoe ENG-WS01 ENG-WS01 (v2024.0500) (lic-eu/25734 301), start Mon 3/2 07:30
    mroe CAD-PC05 CAD-PC05 (v2024.0500) (lic-eu/25734 302), start Mon 3/2 08:15
    kpark DESIGN-01 DESIGN-01 (v2024.0500) (lic-eu/25734 303), start Mon 3/2 08:45
    lnguyen LAPTOP-77 LAPTOP-77 (v2024.0500) (lic-eu/25734 304), start Mon 3/2 09:01
    jdoe ENG-WS02 ENG-WS02 (v2024.0500) (lic-eu/25734 305), start Mon 3/2 09:05

Users of cosmos_sim:  (Total of 8 licenses issued;  Total of 2 licenses in use)

  \"cosmos_sim\" v2024.0500, vendor: SW_D, expiry: 31-dec-2026
  floating license

    jdoe ENG-WS01 ENG-WS01 (v2024.0500) (lic-eu/25734 401), start Mon 3/2 07:35
    kpark DESIGN-01 DESIGN-01 (v2024.0500) (lic-eu/25734 402), start Mon 3/2 08:50

Users of pdm_viewer:  (Total of 5 licenses issued;  Total of 0 licenses in use)
";
