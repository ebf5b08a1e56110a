//! Literal installer script template.
//!
//! The trailing text of every composed script. It consumes the defines and
//! commands supplied on the compiler command line and the macros emitted by
//! the fragment providers ahead of it. The uninstaller sub-build compiles
//! the same template with `BUILD_UNINSTALLER` defined, which reduces it to
//! the stub that extracts the standalone uninstall binary.

/// Main installer template text.
pub const INSTALLER_TEMPLATE: &str = r#"
!include "MUI2.nsh"
!include "FileFunc.nsh"
!include "x64.nsh"

Name "${PRODUCT_NAME}"
BrandingText "${PRODUCT_NAME} ${VERSION}"

!ifdef REQUEST_EXECUTION_LEVEL
  RequestExecutionLevel ${REQUEST_EXECUTION_LEVEL}
!endif

!ifdef ONE_CLICK
  AutoCloseWindow true
!endif

!insertmacro installerIcons
!insertmacro licensePage
!insertmacro languageFiles

!macro extractAppPayload
  SetCompress off
  ; Web builds embed no payload; the archive named in the package manifest
  ; is fetched beforehand and handed over via /PACKAGE-FILE.
  !ifndef WEB_INSTALLER
    !ifdef APP_64
      ${If} ${RunningX64}
        File "/oname=$PLUGINSDIR\app.7z" "${APP_64}"
      ${EndIf}
    !endif
    !ifdef APP_ARM64
      ${If} ${IsNativeARM64}
        File "/oname=$PLUGINSDIR\app.7z" "${APP_ARM64}"
      ${EndIf}
    !endif
    !ifdef APP_32
      ${IfNot} ${RunningX64}
        File "/oname=$PLUGINSDIR\app.7z" "${APP_32}"
      ${EndIf}
    !endif
  !endif
  ; /PACKAGE-FILE runtime override takes precedence over the baked-in
  ; architecture default (update scenarios hand us a pre-fetched archive).
  ${GetParameters} $R0
  ${GetOptions} $R0 "/PACKAGE-FILE=" $R1
  ${IfNot} ${Errors}
    CopyFiles /SILENT $R1 "$PLUGINSDIR\app.7z"
  !ifdef WEB_INSTALLER
  ${Else}
    Abort "No application package was provided"
  !endif
  ${EndIf}
  Nsis7z::ExtractWithDetails "$PLUGINSDIR\app.7z" "Installing %s..."
!macroend

!ifndef BUILD_UNINSTALLER
Section "Install"
  SetOutPath $INSTDIR
  !insertmacro extractAppPayload
  !insertmacro registerFileAssociations

  WriteRegStr SHCTX "${UNINSTALL_REGISTRY_KEY}" DisplayName "${UNINSTALL_DISPLAY_NAME}"
  WriteRegStr SHCTX "${UNINSTALL_REGISTRY_KEY}" DisplayVersion "${VERSION}"
  WriteRegStr SHCTX "${UNINSTALL_REGISTRY_KEY}" UninstallString '"$INSTDIR\Uninstall ${PRODUCT_FILENAME}.exe"'
  !ifdef ESTIMATED_SIZE
    WriteRegDWORD SHCTX "${UNINSTALL_REGISTRY_KEY}" EstimatedSize "${ESTIMATED_SIZE}"
  !endif
  !ifdef UNINSTALL_REGISTRY_KEY_2
    WriteRegStr SHCTX "${UNINSTALL_REGISTRY_KEY_2}" DisplayName "${UNINSTALL_DISPLAY_NAME}"
    WriteRegStr SHCTX "${UNINSTALL_REGISTRY_KEY_2}" UninstallString '"$INSTDIR\Uninstall ${PRODUCT_FILENAME}.exe"'
  !endif

  !ifdef UNINSTALLER_OUT_FILE
    File "/oname=$INSTDIR\Uninstall ${PRODUCT_FILENAME}.exe" "${UNINSTALLER_OUT_FILE}"
  !endif

  !ifdef RUN_AFTER_FINISH
    Exec '"$INSTDIR\${PRODUCT_FILENAME}.exe"'
  !endif
SectionEnd
!endif

!ifdef BUILD_UNINSTALLER
; Stub build: running this binary writes the real uninstaller to the path
; declared by the parent build, then exits without installing anything.
Function .onInit
  WriteUninstaller "${UNINSTALLER_OUT_FILE}"
  Quit
FunctionEnd

Section "Install"
SectionEnd

Section "Uninstall"
  !insertmacro unregisterFileAssociations
  !ifdef DELETE_APP_DATA_ON_UNINSTALL
    RMDir /r "$APPDATA\${PRODUCT_FILENAME}"
  !endif
  DeleteRegKey SHCTX "${UNINSTALL_REGISTRY_KEY}"
  !ifdef UNINSTALL_REGISTRY_KEY_2
    DeleteRegKey SHCTX "${UNINSTALL_REGISTRY_KEY_2}"
  !endif
  RMDir /r $INSTDIR
SectionEnd
!endif
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD_EMBED: &str = "File \"/oname=$PLUGINSDIR\\app.7z\"";

    // Walks preprocessor conditionals line by line, tracking whether each
    // payload embed sits inside the `!ifndef WEB_INSTALLER` block.
    #[test]
    fn web_builds_embed_no_payload_archives() {
        let mut depth = 0i32;
        let mut guard_depth = None;
        let mut total_embeds = 0;
        let mut guarded_embeds = 0;

        for line in INSTALLER_TEMPLATE.lines() {
            let directive = line.trim();
            if directive.starts_with("!ifdef") || directive.starts_with("!ifndef") {
                if directive.starts_with("!ifndef WEB_INSTALLER") {
                    guard_depth = Some(depth);
                }
                depth += 1;
            } else if directive.starts_with("!endif") {
                depth -= 1;
                if guard_depth == Some(depth) {
                    guard_depth = None;
                }
            }
            if line.contains(PAYLOAD_EMBED) {
                total_embeds += 1;
                if guard_depth.is_some() {
                    guarded_embeds += 1;
                }
            }
        }

        assert_eq!(total_embeds, 3);
        assert_eq!(guarded_embeds, 3);
    }

    #[test]
    fn web_builds_abort_without_a_package_override() {
        let web_branch = INSTALLER_TEMPLATE
            .find("!ifdef WEB_INSTALLER")
            .expect("web branch present");
        let macro_end = INSTALLER_TEMPLATE[web_branch..]
            .find("!macroend")
            .expect("branch inside the payload macro");
        assert!(INSTALLER_TEMPLATE[web_branch..web_branch + macro_end].contains("Abort"));
    }
}
