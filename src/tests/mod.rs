mod bin_laws;
mod oracle;
