//! Expo prebuild adapter.
//!
//! Expo projects regenerate their native directories, so instead of the
//! structural block edits used for bare projects the changes are written as
//! tagged generated sections that survive repeated prebuilds.

use regex::Regex;
use serde::Deserialize;
use std::fmt;

use crate::generated::{merge_contents, GeneratedError, MergeResult, Placement, Section};

const MERGE_TAG: &str = "react-native-v8";

/// Engine the app config must select before V8 can replace it.
pub const REQUIRED_ENGINE: &str = "jsc";

/// Native platform of an Expo project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        })
    }
}

/// `app.json`: the config lives under `expo`, or at the top level when that
/// key is absent.
#[derive(Debug, Deserialize)]
struct AppJson {
    expo: Option<ExpoConfig>,
    #[serde(flatten)]
    bare: ExpoConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExpoConfig {
    js_engine: Option<String>,
    #[serde(default)]
    android: PlatformConfig,
    #[serde(default)]
    ios: PlatformConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformConfig {
    js_engine: Option<String>,
}

/// JavaScript engine selected for `platform` in an `app.json` document.
///
/// `android.jsEngine` / `ios.jsEngine` take precedence over `jsEngine`.
pub fn js_engine(app_json: &str, platform: Platform) -> Result<Option<String>, serde_json::Error> {
    let parsed: AppJson = serde_json::from_str(app_json)?;
    let config = parsed.expo.unwrap_or(parsed.bare);
    let specific = match platform {
        Platform::Android => config.android.js_engine,
        Platform::Ios => config.ios.js_engine,
    };
    Ok(specific.or(config.js_engine))
}

const ANDROID_PACKAGING_DSL: &str = r#"
android {
    androidComponents {
        onVariants(selector().withBuildType('release')) {
            packaging.jniLibs.pickFirsts.set([])
            packaging.jniLibs.excludes.add('**/**/libjsc*')
            packaging.jniLibs.excludes.add('**/**/libhermes*')
        }
        onVariants(selector().withBuildType('debug')) {
            packaging.jniLibs.pickFirsts.set([])
            packaging.jniLibs.excludes.add('**/**/libjsc*')
            packaging.jniLibs.pickFirsts.add('**/**/libhermes*')
        }
    }
}

dependencies {
    debugImplementation('com.facebook.react:hermes-android')
}
"#;

const IOS_IMPORTS: &str = r#"#ifndef FOLLY_NO_CONFIG
#define FOLLY_NO_CONFIG 1
#endif

#ifndef FOLLY_MOBILE
#define FOLLY_MOBILE 1
#endif

#ifndef FOLLY_USE_LIBCPP
#define FOLLY_USE_LIBCPP 1
#endif

#ifndef FOLLY_HAVE_PTHREAD
#define FOLLY_HAVE_PTHREAD 1
#endif

#import <memory>
#import <React/RCTCxxBridgeDelegate.h>
#import <React/RCTJSIExecutorRuntimeInstaller.h>
#import <RNV8/V8ExecutorFactory.h>
#if RCT_NEW_ARCH_ENABLED
#import <ReactCommon/RCTTurboModuleManager.h>
#endif
"#;

const IOS_BRIDGE_CATEGORY: &str = r#"#if RCT_NEW_ARCH_ENABLED
@interface AppDelegate() <RCTCxxBridgeDelegate, RCTTurboModuleManagerDelegate>
@end
#else
@interface AppDelegate() <RCTCxxBridgeDelegate>
@end
#endif // RCT_NEW_ARCH_ENABLED
"#;

const IOS_EXECUTOR_FACTORY: &str = r#"
- (std::unique_ptr<facebook::react::JSExecutorFactory>)jsExecutorFactoryForBridge:(RCTBridge *)bridge
{
#if RCT_NEW_ARCH_ENABLED
  self.turboModuleManager = [[RCTTurboModuleManager alloc] initWithBridge:bridge
                                                                 delegate:self
                                                                jsInvoker:bridge.jsCallInvoker];
  // Necessary to allow NativeModules to lookup TurboModules
  [bridge setRCTTurboModuleRegistry:self.turboModuleManager];

#if RCT_DEV
  if (!RCTTurboModuleEagerInitEnabled()) {
    [self.turboModuleManager moduleForName:"RCTDevMenu"];
  }
#endif // RCT_DEV

  return std::make_unique<rnv8::V8ExecutorFactory>(
      facebook::react::RCTJSIExecutorRuntimeInstaller([bridge, turboModuleManager = self.turboModuleManager](facebook::jsi::Runtime &runtime) {
        if (!bridge || !turboModuleManager) {
          return;
        }
        facebook::react::RuntimeExecutor syncRuntimeExecutor =
            [&](std::function<void(facebook::jsi::Runtime & runtime_)> &&callback) { callback(runtime); };
        [turboModuleManager installJSBindingWithRuntimeExecutor:syncRuntimeExecutor];
      }));
#else
  return std::make_unique<rnv8::V8ExecutorFactory>(facebook::react::RCTJSIExecutorRuntimeInstaller(nullptr));
#endif // RCT_NEW_ARCH_ENABLED
}
"#;

/// Append the V8 packaging DSL to a Groovy `android/app/build.gradle`.
pub fn update_android_app_gradle(contents: &str) -> Result<MergeResult, GeneratedError> {
    merge_contents(
        contents,
        &Section {
            tag: MERGE_TAG,
            body: ANDROID_PACKAGING_DSL,
            comment: "//",
            placement: Placement::End,
        },
    )
}

/// Wire the V8 executor factory into an Objective-C++ `AppDelegate.mm`.
pub fn update_ios_app_delegate(contents: &str) -> Result<MergeResult, GeneratedError> {
    let imports_anchor = anchor(r#"^#import "AppDelegate\.h""#)?;
    let implementation_anchor = anchor(r"^@implementation AppDelegate$")?;
    let end_anchor = anchor(r"^@end$")?;

    let steps = [
        (
            "imports",
            IOS_IMPORTS,
            Placement::Anchor {
                anchor: &imports_anchor,
                last: false,
                offset: 1,
            },
        ),
        (
            "cxxBridgeCategory",
            IOS_BRIDGE_CATEGORY,
            Placement::Anchor {
                anchor: &implementation_anchor,
                last: false,
                offset: 0,
            },
        ),
        (
            "jsExecutorFactoryForBridge",
            IOS_EXECUTOR_FACTORY,
            Placement::Anchor {
                anchor: &end_anchor,
                last: true,
                offset: 0,
            },
        ),
    ];

    let mut result = MergeResult {
        contents: contents.to_string(),
        did_merge: false,
        did_clear: false,
    };
    for (suffix, body, placement) in steps {
        let tag = format!("{MERGE_TAG}:{suffix}");
        let merged = merge_contents(
            &result.contents,
            &Section {
                tag: &tag,
                body,
                comment: "//",
                placement,
            },
        )?;
        result = MergeResult {
            contents: merged.contents,
            did_merge: result.did_merge || merged.did_merge,
            did_clear: result.did_clear || merged.did_clear,
        };
    }

    Ok(result)
}

fn anchor(pattern: &str) -> Result<Regex, GeneratedError> {
    Regex::new(pattern).map_err(|source| GeneratedError::InvalidAnchor {
        pattern: pattern.to_string(),
        source,
    })
}
