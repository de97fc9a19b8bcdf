//! Built-in configuration used when the live file does not exist yet.
//!
//! It carries the reserved sections a stock Samba install ships with, so the
//! first managed share is appended after a familiar layout instead of into
//! an empty file.

use super::{parser::parse, Document};

/// Text of the built-in configuration.
pub const DEFAULT_CONFIG: &str = "\
#======================= Global Settings =======================

[global]
   workgroup = WORKGROUP
   server role = standalone server
   log file = /var/log/samba/log.%m
   max log size = 1000
   logging = file
   obey pam restrictions = yes
   unix password sync = yes
   pam password change = yes
   map to guest = never
   usershare allow guests = yes

#======================= Share Definitions =======================

[homes]
   comment = Home Directories
   browseable = no
   read only = yes
   create mask = 0700
   directory mask = 0700
   valid users = %S

[printers]
   comment = All Printers
   browseable = no
   path = /var/tmp
   printable = yes
   guest ok = no
   read only = yes
   create mask = 0700

[print$]
   comment = Printer Drivers
   path = /var/lib/samba/printers
   browseable = yes
   read only = yes
   guest ok = no
";

/// Parses [`DEFAULT_CONFIG`].
pub fn default_document() -> Document {
    parse(DEFAULT_CONFIG)
}
